//! Pluggable collaborator hooks consumed by the core.
//!
//! The surrounding layer can swap out how titles, source locators, ids, and
//! store paths are produced, and provide a confirmation channel for
//! destructive deletions. Every hook has a sensible default; without a
//! confirmation channel destructive deletion is refused.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::document::SourceDocument;
use crate::highlight::HighlightId;

pub struct Hooks {
    /// Display title for a document (default: file stem, falling back to
    /// the canonical name).
    pub title: Box<dyn Fn(&SourceDocument) -> String>,
    /// Locator string pointing back at a highlight's source position
    /// (default: `<name>::<beg>`).
    pub locator: Box<dyn Fn(&SourceDocument, usize) -> String>,
    /// Generator for short collision-resistant highlight ids.
    pub generate_id: Box<dyn Fn() -> HighlightId>,
    /// Maps a source's canonical name to the store path it belongs to.
    pub store_path: Box<dyn Fn(&str) -> PathBuf>,
    /// Confirmation channel for hard deletes; `None` means refuse.
    pub confirm_delete: Option<Box<dyn Fn(&str) -> bool>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            title: Box::new(default_title),
            locator: Box::new(default_locator),
            generate_id: Box::new(HighlightId::generate),
            store_path: Box::new(|_| crate::config::default_store_path()),
            confirm_delete: None,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("confirm_delete", &self.confirm_delete.is_some())
            .finish_non_exhaustive()
    }
}

fn default_title(doc: &SourceDocument) -> String {
    let Some(name) = doc.canonical_name() else {
        return "untitled".to_string();
    };
    Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_string(), |stem| stem.to_string_lossy().to_string())
}

fn default_locator(doc: &SourceDocument, beg: usize) -> String {
    let name = doc.canonical_name().unwrap_or("untitled");
    format!("{name}::{beg}")
}
