// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference
    clippy::module_name_repetitions
)]

//! # Marginalia
//!
//! Mark spans of text in a document, attach free-form annotations, and keep
//! them in a plain-text notes store that outlives the document and can be
//! shared across many documents.
//!
//! The store and every open document stay consistent in both directions:
//! saving a document pushes its tracked highlights into the store; saving
//! the store pulls its state back into every subscribed document.
//!
//! ## Modules
//!
//! - [`document`]: rope-backed source documents with edit-resilient spans
//! - [`highlight`]: highlight entities and the per-document span tracker
//! - [`pen`]: named highlight styles and the pen registry
//! - [`store`]: the plain-text notes store
//! - [`sync`]: the save-triggered synchronization protocol
//! - [`session`]: the operational surface for a command layer
//! - [`hooks`]: pluggable collaborator hooks
//! - [`watcher`]: store-file watching for external edits

pub mod config;
pub mod document;
pub mod highlight;
pub mod hooks;
pub mod pen;
pub mod session;
pub mod store;
pub mod sync;
pub mod watcher;

use std::path::PathBuf;

/// Errors surfaced by the highlight and sync core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("document has no canonical name and cannot be highlighted")]
    UnnamedDocument,

    #[error("no open document named {0}")]
    UnknownDocument(String),

    #[error("no tracked highlight with id {0}")]
    UnknownHighlight(String),

    #[error("no highlight at offset {0}")]
    NoHighlightAt(usize),

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::document::SourceDocument;
    pub use crate::highlight::{Highlight, HighlightId, PenStyle, Span};
    pub use crate::pen::PenRegistry;
    pub use crate::session::{Direction, Session};
    pub use crate::store::NotesStore;
}
