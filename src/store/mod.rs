//! The notes store: durable, human-editable persistence for highlights.
//!
//! One plain-text file records highlights for many source documents. The
//! store is the sole persistence mechanism; the annotation bodies inside it
//! are user-authored and are never silently discarded.

mod parser;
mod types;

pub use parser::parse;
pub use types::{EntrySection, SourceSection, StoreDocument};
pub use types::{BEG_KEY, END_KEY, ID_KEY, LABEL_KEY, LINK_KEY, SOURCE_KEY};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::document::SourceDocument;
use crate::highlight::{is_persistable_key, Highlight, HighlightId, Span};
use crate::{Error, Result};

/// Maximum length of the body excerpt returned by [`NotesStore::upsert`].
pub const BODY_EXCERPT_MAX: usize = 200;

/// Sentinel returned when a highlight has no annotation body yet.
pub const NO_BODY_MARKER: &str = "(no notes)";

/// Confirmation callback for destructive deletions. Receives a prompt and
/// returns whether to proceed.
pub type ConfirmFn = dyn Fn(&str) -> bool;

/// A highlight's durable state as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHighlight {
    pub id: HighlightId,
    pub span: Span,
    pub label: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub body_excerpt: String,
}

/// The structured plain-text store, plus the list of documents subscribed
/// to its save events.
pub struct NotesStore {
    path: PathBuf,
    doc: StoreDocument,
    subscribers: Vec<Weak<RefCell<SourceDocument>>>,
}

impl NotesStore {
    /// Open (or initialize) the store at `path`. A missing file yields an
    /// empty store; it is created on the first save.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| Error::Io {
                action: "read",
                path: path.clone(),
                source,
            })?;
            parse(&text)
        } else {
            StoreDocument::default()
        };
        Ok(Self {
            path,
            doc,
            subscribers: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn document(&self) -> &StoreDocument {
        &self.doc
    }

    /// Whether `source_name` names this store file itself. Saving the store
    /// from its own save cycle is short-circuited.
    pub fn is_self(&self, source_name: &str) -> bool {
        if self.path.to_string_lossy() == source_name {
            return true;
        }
        match (self.path.canonicalize(), Path::new(source_name).canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    // --- Subscriptions ---

    /// Register `doc` as a listener on this store's save event. Idempotent.
    pub fn subscribe(&mut self, doc: &Rc<RefCell<SourceDocument>>) {
        let already = self
            .subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .any(|existing| Rc::ptr_eq(&existing, doc));
        if !already {
            self.subscribers.push(Rc::downgrade(doc));
            doc.borrow_mut().set_sync_initialized();
        }
    }

    /// Live subscribers in registration order; dead handles are pruned.
    pub fn live_subscribers(&mut self) -> Vec<Rc<RefCell<SourceDocument>>> {
        let before = self.subscribers.len();
        self.subscribers.retain(|weak| weak.upgrade().is_some());
        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped closed documents from store subscribers");
        }
        self.subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    // --- Mutation ---

    /// Insert or update the child section for `highlight` under the
    /// top-level section for `source_name`.
    ///
    /// On create the section heading is seeded from `excerpt` and the body
    /// is empty. On update only the position, label, link, and whitelisted
    /// properties are rewritten; the heading and annotation body are the
    /// user's and are left alone.
    ///
    /// Returns the current annotation body, truncated to
    /// [`BODY_EXCERPT_MAX`] chars, or [`NO_BODY_MARKER`] when empty.
    pub fn upsert(
        &mut self,
        source_name: &str,
        title: &str,
        highlight: &Highlight,
        excerpt: Option<&str>,
        link: &str,
    ) -> String {
        if self.doc.find_source(source_name).is_none() {
            self.doc.sections.push(SourceSection {
                title: title.to_string(),
                props: vec![(SOURCE_KEY.to_string(), source_name.to_string())],
                body: Vec::new(),
                entries: Vec::new(),
            });
        }
        let section = self
            .doc
            .find_source_mut(source_name)
            .expect("section just ensured");

        let id = highlight.id().as_str();
        if section.find_entry(id).is_none() {
            let heading = match excerpt {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => format!("highlight {id}"),
            };
            section.entries.push(EntrySection {
                heading,
                props: vec![(ID_KEY.to_string(), id.to_string())],
                body: Vec::new(),
            });
        }
        let entry = section.find_entry_mut(id).expect("entry just ensured");

        let span = highlight.span();
        entry.set_prop(BEG_KEY, span.beg.to_string());
        entry.set_prop(END_KEY, span.end.to_string());
        match highlight.label() {
            Some(label) => entry.set_prop(LABEL_KEY, label),
            None => entry.remove_prop(LABEL_KEY),
        }
        entry.set_prop(LINK_KEY, link);

        // Refresh the whitelisted properties: stale persisted keys the
        // highlight no longer carries are dropped.
        let stale: Vec<String> = entry
            .props
            .iter()
            .map(|(k, _)| k.clone())
            .filter(|k| is_persistable_key(k) && highlight.property(k).is_none())
            .collect();
        for key in stale {
            entry.remove_prop(&key);
        }
        for (key, value) in highlight.persistable_properties() {
            entry.set_prop(key, value);
        }

        body_excerpt(&entry.body_text())
    }

    /// Remove the entry for `id`. The default clears the highlight's
    /// tracking properties but keeps the section and its body; `hard`
    /// deletes the whole section, which requires confirmation when the body
    /// is non-empty. Without a confirmation channel the hard delete is
    /// refused.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: &HighlightId, hard: bool, confirm: Option<&ConfirmFn>) -> bool {
        let id = id.as_str();
        for section in &mut self.doc.sections {
            let Some(idx) = section.entries.iter().position(|e| e.id() == Some(id)) else {
                continue;
            };

            if hard {
                let body = section.entries[idx].body_text();
                if !body.is_empty() {
                    let confirmed = confirm.is_some_and(|f| {
                        f(&format!("Delete highlight {id} and its annotation?"))
                    });
                    if !confirmed {
                        warn!(id, "refusing to delete annotated highlight without confirmation");
                        return false;
                    }
                }
                section.entries.remove(idx);
                return true;
            }

            let entry = &mut section.entries[idx];
            let doomed: Vec<String> = entry
                .props
                .iter()
                .map(|(k, _)| k.clone())
                .filter(|k| {
                    matches!(k.as_str(), ID_KEY | BEG_KEY | END_KEY | LABEL_KEY | LINK_KEY)
                        || k.starts_with(crate::highlight::RESERVED_PREFIX)
                })
                .collect();
            for key in doomed {
                entry.remove_prop(&key);
            }
            return true;
        }
        false
    }

    // --- Queries ---

    /// Every stored highlight under `source_name`, in document order.
    /// Returns empty (with a diagnostic) when no section matches.
    pub fn get_all(&self, source_name: &str) -> Vec<StoredHighlight> {
        let Some(section) = self.doc.find_source(source_name) else {
            debug!(source = source_name, "no notes section for source");
            return Vec::new();
        };

        section
            .entries
            .iter()
            .filter_map(|entry| {
                let id = entry.id()?;
                let beg = entry.prop(BEG_KEY).and_then(|v| v.parse().ok());
                let end = entry.prop(END_KEY).and_then(|v| v.parse().ok());
                let Some((beg, end)) = beg.zip(end) else {
                    debug!(id, "skipping stored entry with missing or invalid span");
                    return None;
                };
                let properties = entry
                    .props
                    .iter()
                    .filter(|(k, _)| is_persistable_key(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(StoredHighlight {
                    id: HighlightId::from(id),
                    span: Span::new(beg, end),
                    label: entry.prop(LABEL_KEY).map(ToOwned::to_owned),
                    properties,
                    body_excerpt: body_excerpt(&entry.body_text()),
                })
            })
            .collect()
    }

    /// The full annotation body for `id`, if its entry exists.
    pub fn body_of(&self, id: &HighlightId) -> Option<String> {
        self.doc
            .sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .find(|e| e.id() == Some(id.as_str()))
            .map(EntrySection::body_text)
    }

    // --- Persistence ---

    /// Write the store to disk.
    ///
    /// # Errors
    /// Returns an error if the file or its parent directory cannot be
    /// written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                action: "create directory for",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, self.doc.serialize()).map_err(|source| Error::Io {
            action: "write",
            path: self.path.clone(),
            source,
        })
    }

    /// Re-read the store from disk, e.g. after an external edit. The
    /// subscriber list is kept.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|source| Error::Io {
            action: "read",
            path: self.path.clone(),
            source,
        })?;
        self.doc = parse(&text);
        Ok(())
    }
}

impl std::fmt::Debug for NotesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotesStore")
            .field("path", &self.path)
            .field("sections", &self.doc.sections.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Truncate a body to the bounded excerpt form.
fn body_excerpt(body: &str) -> String {
    if body.is_empty() {
        return NO_BODY_MARKER.to_string();
    }
    if body.chars().count() <= BODY_EXCERPT_MAX {
        return body.to_string();
    }
    body.chars().take(BODY_EXCERPT_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::PenStyle;

    fn store() -> NotesStore {
        NotesStore {
            path: PathBuf::from("notes.org"),
            doc: StoreDocument::default(),
            subscribers: Vec::new(),
        }
    }

    fn highlight(id: &str, beg: usize, end: usize, label: Option<&str>) -> Highlight {
        let mut tracker = crate::highlight::SpanTracker::new();
        let id = tracker.create(
            Span::new(beg, end),
            label.map(ToOwned::to_owned),
            PenStyle::default(),
            BTreeMap::new(),
            Some(HighlightId::from(id)),
        );
        tracker.get(&id).unwrap().clone()
    }

    // --- Upsert ---

    #[test]
    fn test_upsert_creates_section_and_entry() {
        let mut store = store();
        store.upsert("a.txt", "Doc A", &highlight("abcd1234", 10, 20, Some("yellow")), Some("the text"), "a.txt::10");

        let all = store.get_all("a.txt");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id.as_str(), "abcd1234");
        assert_eq!(all[0].span, Span::new(10, 20));
        assert_eq!(all[0].label.as_deref(), Some("yellow"));
        assert_eq!(all[0].body_excerpt, NO_BODY_MARKER);
    }

    #[test]
    fn test_upsert_twice_does_not_duplicate() {
        let mut store = store();
        let hl = highlight("abcd1234", 10, 20, None);
        store.upsert("a.txt", "Doc A", &hl, Some("x"), "a.txt::10");
        store.upsert("a.txt", "Doc A", &hl, Some("x"), "a.txt::10");
        assert_eq!(store.get_all("a.txt").len(), 1);
        assert_eq!(store.document().sections.len(), 1);
    }

    #[test]
    fn test_upsert_updates_position_but_not_heading_or_body() {
        let mut store = store();
        store.upsert("a.txt", "Doc A", &highlight("abcd1234", 10, 20, None), Some("original"), "a.txt::10");

        // Simulate user edits to the heading and body.
        {
            let section = store.doc.find_source_mut("a.txt").unwrap();
            let entry = section.find_entry_mut("abcd1234").unwrap();
            entry.heading = "my own words".to_string();
            entry.body = vec!["important thought".to_string()];
        }

        let body = store.upsert("a.txt", "Doc A", &highlight("abcd1234", 15, 25, None), Some("newer text"), "a.txt::15");
        let section = store.doc.find_source("a.txt").unwrap();
        let entry = section.find_entry("abcd1234").unwrap();
        assert_eq!(entry.heading, "my own words");
        assert_eq!(entry.body_text(), "important thought");
        assert_eq!(entry.prop(BEG_KEY), Some("15"));
        assert_eq!(entry.prop(END_KEY), Some("25"));
        assert_eq!(body, "important thought");
    }

    #[test]
    fn test_upsert_refreshes_whitelisted_properties() {
        let mut store = store();
        let mut tracker = crate::highlight::SpanTracker::new();
        let id = tracker.create(
            Span::new(0, 4),
            None,
            PenStyle::default(),
            BTreeMap::from([("CATEGORY".to_string(), "work".to_string())]),
            Some(HighlightId::from("abcd1234")),
        );
        let hl = tracker.get(&id).unwrap().clone();
        store.upsert("a.txt", "A", &hl, None, "a.txt::0");
        assert_eq!(store.get_all("a.txt")[0].properties.get("CATEGORY").unwrap(), "work");

        // Property gone from the live highlight: dropped on the next upsert.
        let bare = highlight("abcd1234", 0, 4, None);
        store.upsert("a.txt", "A", &bare, None, "a.txt::0");
        assert!(store.get_all("a.txt")[0].properties.is_empty());
    }

    #[test]
    fn test_upsert_body_excerpt_is_bounded() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        {
            let entry = store
                .doc
                .find_source_mut("a.txt")
                .unwrap()
                .find_entry_mut("abcd1234")
                .unwrap();
            entry.body = vec!["x".repeat(500)];
        }
        let body = store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        assert_eq!(body.chars().count(), BODY_EXCERPT_MAX);
    }

    // --- Remove ---

    #[test]
    fn test_soft_remove_keeps_body_and_heading() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, Some("red")), Some("excerpt"), "a.txt::0");
        {
            let entry = store
                .doc
                .find_source_mut("a.txt")
                .unwrap()
                .find_entry_mut("abcd1234")
                .unwrap();
            entry.body = vec!["keep me".to_string()];
        }

        assert!(store.remove(&HighlightId::from("abcd1234"), false, None));
        let entry = &store.doc.sections[0].entries[0];
        assert_eq!(entry.heading, "excerpt");
        assert_eq!(entry.body_text(), "keep me");
        assert!(entry.id().is_none());
        assert!(entry.prop(BEG_KEY).is_none());
        // The entry is now stale and invisible to get_all.
        assert!(store.get_all("a.txt").is_empty());
    }

    #[test]
    fn test_hard_remove_with_empty_body_needs_no_confirmation() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        assert!(store.remove(&HighlightId::from("abcd1234"), true, None));
        assert!(store.doc.sections[0].entries.is_empty());
    }

    #[test]
    fn test_hard_remove_refused_without_confirmation() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        store
            .doc
            .find_source_mut("a.txt")
            .unwrap()
            .find_entry_mut("abcd1234")
            .unwrap()
            .body = vec!["precious".to_string()];

        assert!(!store.remove(&HighlightId::from("abcd1234"), true, None));
        assert_eq!(store.doc.sections[0].entries.len(), 1);
    }

    #[test]
    fn test_hard_remove_proceeds_when_confirmed() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        store
            .doc
            .find_source_mut("a.txt")
            .unwrap()
            .find_entry_mut("abcd1234")
            .unwrap()
            .body = vec!["precious".to_string()];

        let yes: &ConfirmFn = &|_| true;
        assert!(store.remove(&HighlightId::from("abcd1234"), true, Some(yes)));
        assert!(store.doc.sections[0].entries.is_empty());
    }

    #[test]
    fn test_remove_unknown_id_is_false() {
        let mut store = store();
        assert!(!store.remove(&HighlightId::from("zzzzzzzz"), false, None));
    }

    // --- Queries ---

    #[test]
    fn test_get_all_unknown_source_is_empty() {
        let store = store();
        assert!(store.get_all("nope.txt").is_empty());
    }

    #[test]
    fn test_get_all_skips_entries_missing_position() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        store
            .doc
            .find_source_mut("a.txt")
            .unwrap()
            .entries
            .push(EntrySection {
                heading: "user-added stray".to_string(),
                props: Vec::new(),
                body: Vec::new(),
            });
        assert_eq!(store.get_all("a.txt").len(), 1);
    }

    #[test]
    fn test_get_all_skips_entries_with_unparseable_span() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("abcd1234", 0, 4, None), None, "a.txt::0");
        let entry = store
            .doc
            .find_source_mut("a.txt")
            .unwrap()
            .find_entry_mut("abcd1234")
            .unwrap();
        entry.set_prop(BEG_KEY, "not-a-number");
        assert!(store.get_all("a.txt").is_empty());
    }

    #[test]
    fn test_get_all_preserves_document_order() {
        let mut store = store();
        store.upsert("a.txt", "A", &highlight("bbbb2222", 30, 40, None), None, "a.txt::30");
        store.upsert("a.txt", "A", &highlight("aaaa1111", 10, 20, None), None, "a.txt::10");
        let ids: Vec<_> = store.get_all("a.txt").iter().map(|s| s.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["bbbb2222", "aaaa1111"]);
    }

    // --- Persistence ---

    #[test]
    fn test_save_and_reopen_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.org");

        let mut store = NotesStore::open(&path).unwrap();
        store.upsert("a.txt", "Doc A", &highlight("abcd1234", 10, 20, Some("yellow")), Some("the text"), "a.txt::10");
        store.save().unwrap();

        let reopened = NotesStore::open(&path).unwrap();
        let all = reopened.get_all("a.txt");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].span, Span::new(10, 20));
        assert_eq!(all[0].label.as_deref(), Some("yellow"));
    }

    #[test]
    fn test_is_self_matches_own_path() {
        let store = store();
        assert!(store.is_self("notes.org"));
        assert!(!store.is_self("other.org"));
    }

    // --- Subscribers ---

    #[test]
    fn test_subscribe_is_idempotent_and_prunes_dead() {
        let mut store = store();
        let doc = Rc::new(RefCell::new(SourceDocument::from_text("a.txt", "hello")));
        store.subscribe(&doc);
        store.subscribe(&doc);
        assert_eq!(store.live_subscribers().len(), 1);
        assert!(doc.borrow().is_sync_initialized());

        drop(doc);
        assert!(store.live_subscribers().is_empty());
    }
}
