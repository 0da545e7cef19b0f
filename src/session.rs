//! Session facade: the operational surface consumed by a command layer.
//!
//! A [`Session`] owns the pen registry, the notes store, the map of open
//! documents, and the collaborator [`Hooks`], and exposes the user-facing
//! operations: create, remove, navigate, toggle visibility, change pen, and
//! open an annotation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::warn;

use crate::document::SourceDocument;
use crate::highlight::{HighlightId, NavOutcome, Span};
use crate::hooks::Hooks;
use crate::pen::{CreateMode, PenRegistry, SourceMeta};
use crate::store::{NotesStore, NO_BODY_MARKER};
use crate::sync;
use crate::{Error, Result};

/// Navigation direction for [`Session::navigate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

pub struct Session {
    pens: PenRegistry,
    store: NotesStore,
    docs: HashMap<String, Rc<RefCell<SourceDocument>>>,
    hooks: Hooks,
}

impl Session {
    /// Start a session against the store at `store_path`, with default
    /// hooks.
    ///
    /// # Errors
    /// Returns an error if an existing store file cannot be read.
    pub fn new(store_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_hooks(store_path, Hooks::default())
    }

    /// # Errors
    /// Returns an error if an existing store file cannot be read.
    pub fn with_hooks(store_path: impl AsRef<Path>, hooks: Hooks) -> Result<Self> {
        Ok(Self {
            pens: PenRegistry::new(),
            store: NotesStore::open(store_path)?,
            docs: HashMap::new(),
            hooks,
        })
    }

    /// Start a session whose store location is resolved from a source's
    /// canonical name through the `store_path` hook.
    ///
    /// # Errors
    /// Returns an error if an existing store file cannot be read.
    pub fn for_source(source_name: &str, hooks: Hooks) -> Result<Self> {
        let store_path = (hooks.store_path)(source_name);
        Self::with_hooks(store_path, hooks)
    }

    pub const fn pens(&self) -> &PenRegistry {
        &self.pens
    }

    pub const fn pens_mut(&mut self) -> &mut PenRegistry {
        &mut self.pens
    }

    pub const fn store(&self) -> &NotesStore {
        &self.store
    }

    pub const fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    // --- Documents ---

    /// Register a document with the session: subscribes it to the store's
    /// save event and loads its stored highlights into the tracker.
    ///
    /// # Errors
    /// Fails if the document is unnamable.
    pub fn open_document(&mut self, doc: SourceDocument) -> Result<Rc<RefCell<SourceDocument>>> {
        let Some(name) = doc.canonical_name().map(ToOwned::to_owned) else {
            return Err(Error::UnnamedDocument);
        };
        let doc = Rc::new(RefCell::new(doc));
        sync::subscribe(&mut self.store, &doc);
        sync::load_document(&doc, &mut self.store, &self.pens)?;
        self.docs.insert(name, Rc::clone(&doc));
        Ok(doc)
    }

    /// Read a file from disk and register it.
    ///
    /// # Errors
    /// Fails if the file cannot be read.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<Rc<RefCell<SourceDocument>>> {
        self.open_document(SourceDocument::open(path)?)
    }

    pub fn document(&self, name: &str) -> Result<Rc<RefCell<SourceDocument>>> {
        self.docs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDocument(name.to_string()))
    }

    // --- Operations ---

    /// Create a highlight over `[beg, end)` in the named document using the
    /// given pen (or the default pen). Returns the new id.
    ///
    /// # Errors
    /// Fails for unknown documents.
    pub fn create_highlight(
        &mut self,
        name: &str,
        beg: usize,
        end: usize,
        label: Option<&str>,
    ) -> Result<HighlightId> {
        let doc = self.document(name)?;
        let mut doc = doc.borrow_mut();
        let meta = SourceMeta {
            title: (self.hooks.title)(&doc),
            link: (self.hooks.locator)(&doc, beg),
        };
        let id = (self.hooks.generate_id)();
        self.pens.create(
            &mut doc,
            &mut self.store,
            Span::new(beg, end),
            label,
            Some(id),
            CreateMode::New,
            &meta,
        )
    }

    /// Remove the highlight at `at`. A soft removal clears the store
    /// entry's tracking properties but keeps the annotation; `hard` deletes
    /// the whole entry, subject to the confirmation hook when the body is
    /// non-empty (refused without one).
    ///
    /// Returns whether a highlight was removed.
    ///
    /// # Errors
    /// Fails for unknown documents.
    pub fn remove_highlight(&mut self, name: &str, at: usize, hard: bool) -> Result<bool> {
        let doc = self.document(name)?;
        let mut doc = doc.borrow_mut();
        let Some(id) = doc.tracker().find_at(at).map(|hl| hl.id().clone()) else {
            return Ok(false);
        };

        let in_store = self.store.body_of(&id).is_some();
        if in_store {
            let confirm = self.hooks.confirm_delete.as_deref();
            let removed = self.store.remove(&id, hard, confirm);
            if hard && !removed {
                // Refused destructive deletion also cancels the tracker
                // removal.
                return Ok(false);
            }
        }
        doc.tracker_mut().remove(&id);
        Ok(true)
    }

    /// Move the document cursor to the next or previous visible highlight,
    /// wrapping around. Returns whether the cursor moved.
    ///
    /// # Errors
    /// Fails for unknown documents.
    pub fn navigate(&mut self, name: &str, direction: Direction) -> Result<bool> {
        let doc = self.document(name)?;
        let mut doc = doc.borrow_mut();
        doc.tracker_mut().sort();

        let outcome = {
            let is_visible = |offset: usize| doc.is_visible(offset);
            match direction {
                Direction::Next => doc.tracker().next_from(doc.cursor(), &is_visible),
                Direction::Prev => doc.tracker().prev_from(doc.cursor(), &is_visible),
            }
        };
        match outcome {
            NavOutcome::Moved(pos) => {
                doc.set_cursor(pos);
                Ok(true)
            }
            NavOutcome::NoHighlights => {
                warn!(document = name, "no highlights");
                Ok(false)
            }
            NavOutcome::NoneVisible => {
                warn!(document = name, "no visible highlights");
                Ok(false)
            }
        }
    }

    /// Hide or re-show every highlight in the named document. Returns
    /// whether highlights are visible afterwards.
    ///
    /// # Errors
    /// Fails for unknown documents.
    pub fn toggle_visibility(&mut self, name: &str) -> Result<bool> {
        let doc = self.document(name)?;
        let shown = doc.borrow_mut().tracker_mut().toggle_visibility();
        Ok(shown)
    }

    /// Swap the pen of the highlight at `at`, keeping its id and span.
    ///
    /// # Errors
    /// Fails for unknown documents or when no highlight covers `at`.
    pub fn change_pen(&mut self, name: &str, at: usize, new_label: &str) -> Result<()> {
        let doc = self.document(name)?;
        let mut doc = doc.borrow_mut();
        let Some(id) = doc.tracker().find_at(at).map(|hl| hl.id().clone()) else {
            return Err(Error::NoHighlightAt(at));
        };
        let meta = SourceMeta {
            title: (self.hooks.title)(&doc),
            link: (self.hooks.locator)(&doc, at),
        };
        self.pens
            .change_pen(&mut doc, &mut self.store, &id, new_label, &meta)
    }

    /// The annotation body of the highlight at `at`. Unless `view_only`,
    /// the store entry is created first so the annotation has somewhere to
    /// live.
    ///
    /// # Errors
    /// Fails for unknown documents or when no highlight covers `at`.
    pub fn open_annotation(&mut self, name: &str, at: usize, view_only: bool) -> Result<String> {
        let doc = self.document(name)?;
        let doc = doc.borrow();
        let Some(hl) = doc.tracker().find_at(at).cloned() else {
            return Err(Error::NoHighlightAt(at));
        };

        if !view_only {
            let source = doc.canonical_name().ok_or(Error::UnnamedDocument)?;
            let excerpt = doc.excerpt(hl.span());
            self.store.upsert(
                source,
                &(self.hooks.title)(&doc),
                &hl,
                Some(excerpt.as_str()).filter(|e| !e.is_empty()),
                &(self.hooks.locator)(&doc, hl.span().beg),
            );
        }

        let body = self.store.body_of(hl.id()).unwrap_or_default();
        if body.is_empty() {
            Ok(NO_BODY_MARKER.to_string())
        } else {
            Ok(body)
        }
    }

    // --- Save events ---

    /// Save the named document: write its text back to disk (when file
    /// backed) and run the push half of the sync protocol.
    ///
    /// # Errors
    /// Fails for unknown documents or on I/O errors.
    pub fn save_document(&mut self, name: &str) -> Result<()> {
        let doc = self.document(name)?;
        doc.borrow_mut().write_back()?;
        sync::source_saved(&doc, &mut self.store, &self.pens, &self.hooks)
    }

    /// Persist the store and run the pull half of the sync protocol for
    /// every subscriber.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn save_store(&mut self) -> Result<()> {
        self.store.save()?;
        sync::store_saved(&mut self.store, &self.pens)
    }

    /// Re-read the store from disk (after an external edit) and pull the
    /// new state into every subscriber.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn reload_store(&mut self) -> Result<()> {
        self.store.reload()?;
        sync::store_saved(&mut self.store, &self.pens)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("documents", &self.docs.len())
            .finish_non_exhaustive()
    }
}
