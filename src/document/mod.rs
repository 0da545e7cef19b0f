//! Source documents: rope-backed editable text with live highlight tracking.
//!
//! A [`SourceDocument`] owns the text being annotated and the
//! [`SpanTracker`] holding its highlights. Every edit goes through the
//! document so tracked spans (and folds, and the cursor) re-anchor
//! automatically.

mod marker;

pub use marker::TextEdit;

use std::fs;
use std::path::{Path, PathBuf};

use ropey::Rope;
use tracing::debug;

use crate::highlight::{HighlightId, Span, SpanTracker};
use crate::store::NotesStore;
use crate::{Error, Result};

/// A text document identified by a canonical name, owning the live set of
/// highlights recorded against it.
pub struct SourceDocument {
    name: Option<String>,
    backing_path: Option<PathBuf>,
    rope: Rope,
    tracker: SpanTracker,
    writable: bool,
    dirty: bool,
    cursor: usize,
    folds: Vec<Span>,
    sync_initialized: bool,
    pending_store_removals: Vec<HighlightId>,
}

impl SourceDocument {
    /// Create a document from text with a canonical name.
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self {
            name: Some(name.into()),
            backing_path: None,
            rope: Rope::from_str(text),
            tracker: SpanTracker::new(),
            writable: true,
            dirty: false,
            cursor: 0,
            folds: Vec::new(),
            sync_initialized: false,
            pending_store_removals: Vec::new(),
        }
    }

    /// Create a document with no resolvable canonical name (e.g. a scratch
    /// view). Highlights cannot be created against it.
    pub fn unnamed(text: &str) -> Self {
        let mut doc = Self::from_text("", text);
        doc.name = None;
        doc
    }

    /// Read a document from disk; the canonical name is the path itself.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = Self::from_text(path.to_string_lossy(), &text);
        doc.backing_path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Write the current text back to the backing file, if any, and mark
    /// the document clean.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_back(&mut self) -> Result<()> {
        if let Some(path) = &self.backing_path {
            fs::write(path, self.text()).map_err(|source| Error::Io {
                action: "write",
                path: path.clone(),
                source,
            })?;
        }
        self.dirty = false;
        Ok(())
    }

    /// The canonical name, or `None` for unnamable documents.
    pub fn canonical_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn tracker(&self) -> &SpanTracker {
        &self.tracker
    }

    pub const fn tracker_mut(&mut self) -> &mut SpanTracker {
        &mut self.tracker
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// The text covered by `span`, clamped to the document.
    pub fn slice(&self, span: Span) -> String {
        let end = span.end.min(self.rope.len_chars());
        let beg = span.beg.min(end);
        self.rope.slice(beg..end).to_string()
    }

    /// The covered text with embedded line breaks collapsed to spaces,
    /// suitable for a store heading.
    pub fn excerpt(&self, span: Span) -> String {
        self.slice(span)
            .split(['\n', '\r'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    pub const fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset.min(self.rope.len_chars());
    }

    /// True once the document has registered with a notes store for
    /// push-back.
    pub const fn is_sync_initialized(&self) -> bool {
        self.sync_initialized
    }

    pub(crate) const fn set_sync_initialized(&mut self) {
        self.sync_initialized = true;
    }

    // --- Editing ---

    /// Insert `text` at char offset `at`, re-anchoring all tracked spans.
    pub fn insert(&mut self, at: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let at = at.min(self.rope.len_chars());
        self.rope.insert(at, text);
        self.apply_edit(TextEdit::insertion(at, text.chars().count()));
    }

    /// Delete the chars in `[beg, end)`, re-anchoring all tracked spans.
    pub fn delete(&mut self, beg: usize, end: usize) {
        let end = end.min(self.rope.len_chars());
        let beg = beg.min(end);
        if beg == end {
            return;
        }
        self.rope.remove(beg..end);
        self.apply_edit(TextEdit::deletion(beg, end));
    }

    /// Replace `[beg, end)` with `text`.
    pub fn replace(&mut self, beg: usize, end: usize, text: &str) {
        let end = end.min(self.rope.len_chars());
        let beg = beg.min(end);
        self.rope.remove(beg..end);
        self.rope.insert(beg, text);
        self.apply_edit(TextEdit {
            start: beg,
            old_end: end,
            new_end: beg + text.chars().count(),
        });
    }

    fn apply_edit(&mut self, edit: TextEdit) {
        self.tracker.apply_edit(&edit);
        for fold in &mut self.folds {
            *fold = edit.adjust_span(*fold);
        }
        self.folds.retain(|fold| !fold.is_degenerate());
        self.cursor = edit.adjust_position(self.cursor);
        self.dirty = true;
    }

    // --- Folding / visibility ---

    /// Hide `[beg, end)` from navigation. Highlights starting inside a fold
    /// are treated as invisible.
    pub fn fold(&mut self, beg: usize, end: usize) {
        let span = Span::new(beg, end);
        if !span.is_degenerate() {
            self.folds.push(span);
        }
    }

    pub fn unfold_all(&mut self) {
        self.folds.clear();
    }

    /// Whether `offset` is within the visible (unfolded) portion.
    pub fn is_visible(&self, offset: usize) -> bool {
        !self.folds.iter().any(|fold| fold.contains(offset))
    }

    // --- Housekeeping ---

    /// Prune degenerate highlights from the tracker and, when the document
    /// is writable, remove their store entries (plus any removals deferred
    /// from earlier passes). Returns the number pruned from the tracker.
    pub fn housekeep(&mut self, store: &mut NotesStore) -> usize {
        let pruned = self.tracker.prune_degenerate();
        let count = pruned.len();

        let mut doomed: Vec<HighlightId> = self.pending_store_removals.drain(..).collect();
        doomed.extend(pruned.into_iter().map(|hl| hl.id().clone()));

        if self.writable {
            for id in &doomed {
                store.remove(id, false, None);
            }
        } else if !doomed.is_empty() {
            debug!(
                count = doomed.len(),
                "document read-only; deferring store removals to next housekeeping pass"
            );
            self.pending_store_removals = doomed;
        }
        count
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field(
                "rope",
                &format_args!("Rope({} chars)", self.rope.len_chars()),
            )
            .field("highlights", &self.tracker.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
