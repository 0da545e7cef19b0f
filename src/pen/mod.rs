//! Pens: named styles that act as highlight factories.
//!
//! A pen maps a label to a rendering style and a set of default properties.
//! The registry is an explicit object passed by reference wherever highlights
//! are created; labels are looked up tagged, with a guaranteed default pen
//! standing in for missing or unrecognized labels.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::document::SourceDocument;
use crate::highlight::{HighlightId, PenStyle, Span};
use crate::store::NotesStore;
use crate::{Error, Result};

/// Label of the pen used when none is given or the stored label is unknown.
pub const DEFAULT_PEN: &str = "default";

/// A named style plus default properties for the highlights it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pen {
    pub label: String,
    pub style: PenStyle,
    pub defaults: BTreeMap<String, String>,
}

/// Whether a creation originates new data (`New`), reconstructs store state
/// (`Load`), or swaps the pen of an existing highlight (`Change`). `Load`
/// bypasses the store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    New,
    Load,
    Change,
}

/// Title and source-locator strings for the store entry, resolved by the
/// caller's hooks.
#[derive(Debug, Clone, Default)]
pub struct SourceMeta {
    pub title: String,
    pub link: String,
}

/// Process-scope pen table. Re-registration overwrites silently.
#[derive(Debug)]
pub struct PenRegistry {
    pens: HashMap<String, Pen>,
}

impl PenRegistry {
    /// A registry holding only the default pen.
    pub fn new() -> Self {
        let mut registry = Self {
            pens: HashMap::new(),
        };
        registry.register(DEFAULT_PEN, PenStyle::underlined(), BTreeMap::new());
        registry
    }

    pub fn register(
        &mut self,
        label: impl Into<String>,
        style: PenStyle,
        defaults: BTreeMap<String, String>,
    ) {
        let label = label.into();
        self.pens.insert(
            label.clone(),
            Pen {
                label,
                style,
                defaults,
            },
        );
    }

    /// Look up a pen by label, falling back to the default pen for `None`
    /// or an unrecognized label.
    pub fn resolve(&self, label: Option<&str>) -> &Pen {
        if let Some(label) = label {
            if let Some(pen) = self.pens.get(label) {
                return pen;
            }
            warn!(label, "unknown pen label, using default pen");
        }
        self.pens.get(DEFAULT_PEN).expect("default pen always registered")
    }

    pub fn contains(&self, label: &str) -> bool {
        self.pens.contains_key(label)
    }

    /// Create a highlight in `doc` through the pen named `label`.
    ///
    /// The highlight carries the pen's style and default properties; `id`
    /// is generated when omitted. Unless `mode` is [`CreateMode::Load`],
    /// the new state is pushed into the store immediately.
    ///
    /// # Errors
    /// Fails without creating a span or touching the store when the
    /// document has no resolvable canonical name.
    pub fn create(
        &self,
        doc: &mut SourceDocument,
        store: &mut NotesStore,
        span: Span,
        label: Option<&str>,
        id: Option<HighlightId>,
        mode: CreateMode,
        meta: &SourceMeta,
    ) -> Result<HighlightId> {
        let Some(source_name) = doc.canonical_name().map(ToOwned::to_owned) else {
            return Err(Error::UnnamedDocument);
        };

        let pen = self.resolve(label);
        // An unrecognized label keeps the requested name so a later save
        // does not destroy it; only the style falls back to the default pen.
        let recorded_label = label.map(ToOwned::to_owned);

        let id = doc.tracker_mut().create(
            span,
            recorded_label,
            pen.style.clone(),
            pen.defaults.clone(),
            id,
        );

        if !matches!(mode, CreateMode::Load) {
            let excerpt = doc.excerpt(span);
            let highlight = doc
                .tracker()
                .get(&id)
                .expect("highlight just created")
                .clone();
            store.upsert(
                &source_name,
                &meta.title,
                &highlight,
                Some(&excerpt).filter(|e| !e.is_empty()).map(String::as_str),
                &meta.link,
            );
        }

        Ok(id)
    }

    /// Re-create an existing highlight under a new pen, preserving its id
    /// and span so the store entry is updated in place.
    ///
    /// # Errors
    /// Fails if the highlight is unknown or the document is unnamable.
    pub fn change_pen(
        &self,
        doc: &mut SourceDocument,
        store: &mut NotesStore,
        id: &HighlightId,
        new_label: &str,
        meta: &SourceMeta,
    ) -> Result<()> {
        let old = doc
            .tracker_mut()
            .remove(id)
            .ok_or_else(|| Error::UnknownHighlight(id.to_string()))?;
        self.create(
            doc,
            store,
            old.span(),
            Some(new_label),
            Some(id.clone()),
            CreateMode::Change,
            meta,
        )?;
        Ok(())
    }
}

impl Default for PenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixtures() -> (SourceDocument, NotesStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = NotesStore::open(dir.path().join("notes.org")).unwrap();
        let doc = SourceDocument::from_text("a.txt", "the quick brown fox jumps over");
        (doc, store, dir)
    }

    fn meta() -> SourceMeta {
        SourceMeta {
            title: "Doc A".to_string(),
            link: "a.txt::10".to_string(),
        }
    }

    fn yellow_registry() -> PenRegistry {
        let mut pens = PenRegistry::new();
        pens.register(
            "yellow",
            PenStyle::face("yellow"),
            BTreeMap::from([("CATEGORY".to_string(), "review".to_string())]),
        );
        pens
    }

    // --- Registration / lookup ---

    #[test]
    fn test_default_pen_always_present() {
        let pens = PenRegistry::new();
        assert_eq!(pens.resolve(None).label, DEFAULT_PEN);
        assert_eq!(pens.resolve(Some("nonexistent")).label, DEFAULT_PEN);
    }

    #[test]
    fn test_reregistration_overwrites_silently() {
        let mut pens = PenRegistry::new();
        pens.register("blue", PenStyle::face("blue"), BTreeMap::new());
        pens.register("blue", PenStyle::face("navy"), BTreeMap::new());
        assert_eq!(pens.resolve(Some("blue")).style, PenStyle::face("navy"));
    }

    // --- Create ---

    #[test]
    fn test_create_applies_pen_style_and_defaults() {
        let (mut doc, mut store, _dir) = fixtures();
        let pens = yellow_registry();

        let id = pens
            .create(&mut doc, &mut store, Span::new(10, 20), Some("yellow"), None, CreateMode::New, &meta())
            .unwrap();
        assert_eq!(id.as_str().len(), HighlightId::LEN);

        let hl = doc.tracker().get(&id).unwrap();
        assert_eq!(hl.label(), Some("yellow"));
        assert_eq!(*hl.style(), PenStyle::face("yellow"));
        assert_eq!(hl.property("CATEGORY"), Some("review"));

        let stored = store.get_all("a.txt");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].span, Span::new(10, 20));
        assert_eq!(stored[0].label.as_deref(), Some("yellow"));
    }

    #[test]
    fn test_create_on_unnamed_document_fails_cleanly() {
        let (_, mut store, _dir) = fixtures();
        let mut doc = SourceDocument::unnamed("scratch text");
        let pens = PenRegistry::new();

        let err = pens
            .create(&mut doc, &mut store, Span::new(0, 5), None, None, CreateMode::New, &meta())
            .unwrap_err();
        assert!(matches!(err, Error::UnnamedDocument));
        assert!(doc.tracker().is_empty());
        assert!(store.get_all("a.txt").is_empty());
    }

    #[test]
    fn test_load_mode_bypasses_store_write() {
        let (mut doc, mut store, _dir) = fixtures();
        let pens = PenRegistry::new();

        pens.create(
            &mut doc,
            &mut store,
            Span::new(4, 9),
            None,
            Some(HighlightId::from("abcd1234")),
            CreateMode::Load,
            &meta(),
        )
        .unwrap();
        assert_eq!(doc.tracker().len(), 1);
        assert!(store.get_all("a.txt").is_empty());
    }

    #[test]
    fn test_unknown_label_falls_back_in_style_but_keeps_label() {
        let (mut doc, mut store, _dir) = fixtures();
        let pens = PenRegistry::new();

        let id = pens
            .create(&mut doc, &mut store, Span::new(0, 3), Some("vanished"), None, CreateMode::New, &meta())
            .unwrap();
        let hl = doc.tracker().get(&id).unwrap();
        assert_eq!(hl.label(), Some("vanished"));
        assert_eq!(*hl.style(), PenStyle::underlined());
    }

    // --- Change pen ---

    #[test]
    fn test_change_pen_preserves_id_and_span() {
        let (mut doc, mut store, _dir) = fixtures();
        let pens = yellow_registry();

        let id = pens
            .create(&mut doc, &mut store, Span::new(10, 20), None, None, CreateMode::New, &meta())
            .unwrap();
        pens.change_pen(&mut doc, &mut store, &id, "yellow", &meta()).unwrap();

        assert_eq!(doc.tracker().len(), 1);
        let hl = doc.tracker().get(&id).unwrap();
        assert_eq!(hl.span(), Span::new(10, 20));
        assert_eq!(hl.label(), Some("yellow"));

        // Updated in place: exactly one store entry for the id.
        let stored = store.get_all("a.txt");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].label.as_deref(), Some("yellow"));
    }

    #[test]
    fn test_change_pen_unknown_highlight_errors() {
        let (mut doc, mut store, _dir) = fixtures();
        let pens = PenRegistry::new();
        let err = pens
            .change_pen(&mut doc, &mut store, &HighlightId::from("zzzzzzzz"), "default", &meta())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownHighlight(_)));
    }
}
