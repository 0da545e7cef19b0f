//! Save-triggered synchronization between source documents and the store.
//!
//! The protocol runs in both directions:
//!
//! 1. On a source-document save, the document's tracker is housekept and
//!    sorted, every tracked highlight is upserted into the store, and the
//!    store is persisted (unless the store is the document being saved).
//! 2. On a store save, dead subscribers are pruned, then every live
//!    subscriber pulls its section back: entries are diffed against the
//!    tracked set by `(id, span, label)` and changed or new entries are
//!    re-instantiated through the pen registry with the stored label.
//!
//! A store save triggered by step 1 runs the pull-back with the saving
//! document excluded, so a source save can never re-enter its own sync
//! handler.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use crate::document::SourceDocument;
use crate::highlight::HighlightId;
use crate::hooks::Hooks;
use crate::pen::{CreateMode, PenRegistry, SourceMeta};
use crate::store::{NotesStore, StoredHighlight};
use crate::{Error, Result};

/// Register `doc` for pull-back whenever `store` is saved. Idempotent.
pub fn subscribe(store: &mut NotesStore, doc: &Rc<RefCell<SourceDocument>>) {
    store.subscribe(doc);
}

/// Push a document's tracked highlights into the store and persist it.
///
/// Runs housekeeping and a sort first, then upserts every highlight. The
/// persisted store triggers the pull-back pass for *other* subscribers;
/// the saving document is excluded from that pass.
///
/// # Errors
/// Fails if the document is unnamable or the store cannot be written.
pub fn source_saved(
    doc_rc: &Rc<RefCell<SourceDocument>>,
    store: &mut NotesStore,
    pens: &PenRegistry,
    hooks: &Hooks,
) -> Result<()> {
    let name = {
        let mut doc = doc_rc.borrow_mut();
        let Some(name) = doc.canonical_name().map(ToOwned::to_owned) else {
            return Err(Error::UnnamedDocument);
        };

        doc.housekeep(store);
        doc.tracker_mut().sort();

        let title = (hooks.title)(&doc);
        let highlights: Vec<_> = doc.tracker().iter().cloned().collect();
        for hl in highlights {
            let excerpt = doc.excerpt(hl.span());
            let link = (hooks.locator)(&doc, hl.span().beg);
            store.upsert(
                &name,
                &title,
                &hl,
                Some(excerpt.as_str()).filter(|e| !e.is_empty()),
                &link,
            );
        }
        name
    };

    if store.is_self(&name) {
        debug!(source = %name, "store is its own source document; skipping save");
        return Ok(());
    }
    store.save()?;
    pull_back(store, pens, Some(doc_rc))
}

/// Apply store state to every live subscriber after a store save (e.g. an
/// external edit followed by a reload).
///
/// # Errors
/// Fails if re-instantiating a highlight fails.
pub fn store_saved(store: &mut NotesStore, pens: &PenRegistry) -> Result<()> {
    pull_back(store, pens, None)
}

/// Populate a single document's tracker from its stored section, e.g. when
/// the document is first opened.
///
/// # Errors
/// Fails if the document is unnamable.
pub fn load_document(
    doc_rc: &Rc<RefCell<SourceDocument>>,
    store: &mut NotesStore,
    pens: &PenRegistry,
) -> Result<()> {
    let Some(name) = doc_rc.borrow().canonical_name().map(ToOwned::to_owned) else {
        return Err(Error::UnnamedDocument);
    };
    let entries = store.get_all(&name);
    apply_entries(&mut doc_rc.borrow_mut(), store, entries, pens)
}

/// Walk the subscriber list in registration order, excluding `origin`, and
/// re-apply each subscriber's stored section.
///
/// Exclusion is by document identity, not canonical name: two views of the
/// same source are distinct subscribers, and only the one that initiated
/// the save cycle is skipped.
fn pull_back(
    store: &mut NotesStore,
    pens: &PenRegistry,
    origin: Option<&Rc<RefCell<SourceDocument>>>,
) -> Result<()> {
    let subscribers = store.live_subscribers();
    for sub in subscribers {
        if origin.is_some_and(|origin| Rc::ptr_eq(origin, &sub)) {
            debug!("excluding originating document from pull-back");
            continue;
        }
        let Some(name) = sub.borrow().canonical_name().map(ToOwned::to_owned) else {
            continue;
        };
        let entries = store.get_all(&name);
        let mut doc = sub.borrow_mut();
        apply_entries(&mut doc, store, entries, pens)?;
    }
    Ok(())
}

/// Diff stored entries against a document's tracked set and reconcile.
fn apply_entries(
    doc: &mut SourceDocument,
    store: &mut NotesStore,
    entries: Vec<StoredHighlight>,
    pens: &PenRegistry,
) -> Result<()> {
    // The store is authoritative on pull-back: tracked ids without a store
    // entry are stale and dropped.
    let stored_ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    let stale: Vec<HighlightId> = doc
        .tracker()
        .iter()
        .filter(|hl| !stored_ids.contains(hl.id().as_str()))
        .map(|hl| hl.id().clone())
        .collect();
    for id in stale {
        debug!(%id, "tracked highlight absent from store; dropping");
        doc.tracker_mut().remove(&id);
    }

    for entry in entries {
        let unchanged = doc.tracker().get(&entry.id).is_some_and(|hl| {
            hl.span() == entry.span && hl.label() == entry.label.as_deref()
        });
        if unchanged {
            continue;
        }
        // Remove the stale occupant of this id before re-instantiating so
        // the id is never tracked twice.
        doc.tracker_mut().remove(&entry.id);
        pens.create(
            doc,
            store,
            entry.span,
            entry.label.as_deref(),
            Some(entry.id.clone()),
            CreateMode::Load,
            &SourceMeta::default(),
        )?;
        if let Some(hl) = doc.tracker_mut().get_mut(&entry.id) {
            for (key, value) in &entry.properties {
                hl.set_property(key, value);
            }
        }
    }

    doc.tracker_mut().sort();
    Ok(())
}
