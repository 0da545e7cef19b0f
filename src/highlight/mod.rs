//! Highlight entities and the per-document span tracker.
//!
//! A [`Highlight`] is a tracked text span with a stable identity, a rendering
//! style, and a property set. The [`SpanTracker`] owns the live set of
//! highlights for one document and keeps their spans consistent as the
//! document is edited.

mod tracker;

pub use tracker::{NavOutcome, SpanTracker};

use std::collections::BTreeMap;
use std::fmt;

/// Property keys in this namespace are persisted to the notes store.
pub const RESERVED_PREFIX: &str = "marginalia-";

/// Whitelisted property key persisted alongside the reserved namespace.
pub const CATEGORY_KEY: &str = "CATEGORY";

/// Returns true if a property key survives the round trip to the store.
pub fn is_persistable_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX) || key == CATEGORY_KEY
}

/// A half-open `[beg, end)` range of char offsets in a document.
///
/// `beg == end` is the degenerate state left behind when the covered text
/// was deleted out from under the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub beg: usize,
    pub end: usize,
}

impl Span {
    /// Create a span, swapping the endpoints if given in reverse.
    pub const fn new(beg: usize, end: usize) -> Self {
        if beg <= end {
            Self { beg, end }
        } else {
            Self { beg: end, end: beg }
        }
    }

    /// Number of chars covered.
    pub const fn len(&self) -> usize {
        self.end - self.beg
    }

    pub const fn is_empty(&self) -> bool {
        self.beg == self.end
    }

    /// The span has collapsed to zero width.
    pub const fn is_degenerate(&self) -> bool {
        self.is_empty()
    }

    /// Whether `offset` falls inside the half-open range.
    pub const fn contains(&self, offset: usize) -> bool {
        self.beg <= offset && offset < self.end
    }

    /// Whether this span overlaps `[beg, end)`.
    pub const fn overlaps(&self, beg: usize, end: usize) -> bool {
        self.beg < end && beg < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.beg, self.end)
    }
}

/// Rendering attributes for a highlight, independent of persisted properties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PenStyle {
    /// Named face/background, e.g. a color name or hex value.
    pub face: Option<String>,
    pub underline: bool,
    /// Foreground override.
    pub color: Option<String>,
}

impl PenStyle {
    pub fn face(name: impl Into<String>) -> Self {
        Self {
            face: Some(name.into()),
            ..Self::default()
        }
    }

    pub const fn underlined() -> Self {
        Self {
            face: None,
            underline: true,
            color: None,
        }
    }
}

/// Stable identifier for a highlight, unique within its document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HighlightId(String);

impl HighlightId {
    /// Length of generated ids.
    pub const LEN: usize = 8;

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh short id (first [`Self::LEN`] chars of a UUIDv4).
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HighlightId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A tracked text span with identity, style, and properties.
#[derive(Debug, Clone)]
pub struct Highlight {
    id: HighlightId,
    span: Span,
    label: Option<String>,
    style: PenStyle,
    properties: BTreeMap<String, String>,
    hidden: bool,
    saved_style: Option<PenStyle>,
    seq: u64,
}

impl Highlight {
    pub(crate) fn new(
        id: HighlightId,
        span: Span,
        label: Option<String>,
        style: PenStyle,
        properties: BTreeMap<String, String>,
        seq: u64,
    ) -> Self {
        Self {
            id,
            span,
            label,
            style,
            properties,
            hidden: false,
            saved_style: None,
            seq,
        }
    }

    pub const fn id(&self) -> &HighlightId {
        &self.id
    }

    pub const fn span(&self) -> Span {
        self.span
    }

    pub(crate) const fn span_mut(&mut self) -> &mut Span {
        &mut self.span
    }

    /// Label of the pen that created this highlight, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub const fn style(&self) -> &PenStyle {
        &self.style
    }

    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Creation sequence number, used to break find ties in favor of the
    /// most recently created highlight.
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Properties that are persisted to the store: reserved-namespace keys
    /// plus the `CATEGORY` whitelist.
    pub fn persistable_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .filter(|(k, _)| is_persistable_key(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Clear the style and remember it so [`Self::show`] can restore it.
    /// Span and id are untouched.
    pub(crate) fn hide(&mut self) {
        if self.hidden {
            return;
        }
        self.saved_style = Some(std::mem::take(&mut self.style));
        self.hidden = true;
    }

    /// Restore the style remembered by [`Self::hide`].
    pub(crate) fn show(&mut self) {
        if !self.hidden {
            return;
        }
        if let Some(style) = self.saved_style.take() {
            self.style = style;
        }
        self.hidden = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Span ---

    #[test]
    fn test_span_new_normalizes_reversed_endpoints() {
        let span = Span::new(20, 10);
        assert_eq!(span.beg, 10);
        assert_eq!(span.end, 20);
    }

    #[test]
    fn test_span_contains_is_half_open() {
        let span = Span::new(10, 20);
        assert!(span.contains(10));
        assert!(span.contains(19));
        assert!(!span.contains(20));
        assert!(!span.contains(9));
    }

    #[test]
    fn test_span_degenerate_when_collapsed() {
        assert!(Span::new(5, 5).is_degenerate());
        assert!(!Span::new(5, 6).is_degenerate());
    }

    #[test]
    fn test_span_overlaps() {
        let span = Span::new(10, 20);
        assert!(span.overlaps(15, 25));
        assert!(span.overlaps(0, 11));
        assert!(!span.overlaps(20, 30));
        assert!(!span.overlaps(0, 10));
    }

    // --- Ids ---

    #[test]
    fn test_generated_id_has_fixed_length() {
        let id = HighlightId::generate();
        assert_eq!(id.as_str().len(), HighlightId::LEN);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = HighlightId::generate();
        let b = HighlightId::generate();
        assert_ne!(a, b);
    }

    // --- Property filtering ---

    #[test]
    fn test_persistable_keys() {
        assert!(is_persistable_key("marginalia-source"));
        assert!(is_persistable_key("CATEGORY"));
        assert!(!is_persistable_key("scratch"));
        assert!(!is_persistable_key("category"));
    }

    #[test]
    fn test_persistable_properties_filters_unreserved_keys() {
        let mut props = BTreeMap::new();
        props.insert("marginalia-note".to_string(), "x".to_string());
        props.insert("CATEGORY".to_string(), "work".to_string());
        props.insert("transient".to_string(), "y".to_string());
        let hl = Highlight::new(
            HighlightId::from("abcd1234"),
            Span::new(0, 4),
            None,
            PenStyle::default(),
            props,
            0,
        );
        let kept: Vec<_> = hl.persistable_properties().map(|(k, _)| k).collect();
        assert_eq!(kept, vec!["CATEGORY", "marginalia-note"]);
    }

    // --- Hide / show ---

    #[test]
    fn test_hide_clears_style_and_show_restores_it() {
        let style = PenStyle::face("yellow");
        let mut hl = Highlight::new(
            HighlightId::from("abcd1234"),
            Span::new(0, 4),
            Some("yellow".to_string()),
            style.clone(),
            BTreeMap::new(),
            0,
        );

        hl.hide();
        assert!(hl.is_hidden());
        assert_eq!(*hl.style(), PenStyle::default());

        hl.show();
        assert!(!hl.is_hidden());
        assert_eq!(*hl.style(), style);
    }

    #[test]
    fn test_hide_is_idempotent_and_preserves_span() {
        let mut hl = Highlight::new(
            HighlightId::from("abcd1234"),
            Span::new(3, 9),
            None,
            PenStyle::underlined(),
            BTreeMap::new(),
            0,
        );
        hl.hide();
        hl.hide();
        assert_eq!(hl.span(), Span::new(3, 9));
        hl.show();
        assert_eq!(*hl.style(), PenStyle::underlined());
    }
}
