//! In-memory model of the notes store document.
//!
//! The store is a two-level outline: one top-level section per source
//! document, one child section per highlight. Each section carries a
//! heading, an ordered property drawer, and free-form body lines. Body
//! text is user-authored and must survive every rewrite verbatim.

/// Property key naming the source document in a top-level section.
pub const SOURCE_KEY: &str = "source";
/// Property keys serialized into a highlight's child section.
pub const ID_KEY: &str = "id";
pub const BEG_KEY: &str = "beg";
pub const END_KEY: &str = "end";
pub const LABEL_KEY: &str = "label";
pub const LINK_KEY: &str = "link";

/// The parsed store: optional preamble text, then one section per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreDocument {
    /// Lines before the first heading, preserved verbatim.
    pub preamble: Vec<String>,
    pub sections: Vec<SourceSection>,
}

/// Top-level section for one source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSection {
    /// Display title (the heading text); user-editable.
    pub title: String,
    pub props: Vec<(String, String)>,
    /// Body lines between the drawer and the first child section.
    pub body: Vec<String>,
    pub entries: Vec<EntrySection>,
}

/// Child section holding one highlight's durable state plus the
/// user-authored annotation body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySection {
    /// Excerpt seeded at creation; user-editable and never overwritten.
    pub heading: String,
    pub props: Vec<(String, String)>,
    pub body: Vec<String>,
}

impl SourceSection {
    pub fn source_name(&self) -> Option<&str> {
        prop(&self.props, SOURCE_KEY)
    }

    pub fn find_entry(&self, id: &str) -> Option<&EntrySection> {
        self.entries.iter().find(|e| e.id() == Some(id))
    }

    pub fn find_entry_mut(&mut self, id: &str) -> Option<&mut EntrySection> {
        self.entries.iter_mut().find(|e| e.id() == Some(id))
    }
}

impl EntrySection {
    pub fn id(&self) -> Option<&str> {
        self.prop(ID_KEY)
    }

    pub fn prop(&self, key: &str) -> Option<&str> {
        prop(&self.props, key)
    }

    /// Set a property in place, preserving its position; appends if new.
    pub fn set_prop(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.props.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.props.push((key.to_string(), value));
        }
    }

    pub fn remove_prop(&mut self, key: &str) {
        self.props.retain(|(k, _)| k != key);
    }

    /// The annotation body as a single trimmed string.
    pub fn body_text(&self) -> String {
        self.body.join("\n").trim().to_string()
    }
}

fn prop<'a>(props: &'a [(String, String)], key: &str) -> Option<&'a str> {
    props
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

impl StoreDocument {
    pub fn find_source(&self, name: &str) -> Option<&SourceSection> {
        self.sections.iter().find(|s| s.source_name() == Some(name))
    }

    pub fn find_source_mut(&mut self, name: &str) -> Option<&mut SourceSection> {
        self.sections
            .iter_mut()
            .find(|s| s.source_name() == Some(name))
    }

    /// Render the document back to its plain-text form. Headings, property
    /// drawers, and body lines round-trip through [`crate::store::parse`].
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for section in &self.sections {
            out.push_str("* ");
            out.push_str(&section.title);
            out.push('\n');
            write_drawer(&mut out, &section.props);
            for line in &section.body {
                out.push_str(line);
                out.push('\n');
            }
            for entry in &section.entries {
                out.push_str("** ");
                out.push_str(&entry.heading);
                out.push('\n');
                write_drawer(&mut out, &entry.props);
                for line in &entry.body {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }
}

fn write_drawer(out: &mut String, props: &[(String, String)]) {
    if props.is_empty() {
        return;
    }
    out.push_str(":PROPERTIES:\n");
    for (key, value) in props {
        out.push(':');
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(":END:\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_prop_updates_in_place() {
        let mut entry = EntrySection {
            heading: "x".to_string(),
            props: vec![
                ("id".to_string(), "abcd".to_string()),
                ("beg".to_string(), "1".to_string()),
            ],
            body: Vec::new(),
        };
        entry.set_prop("beg", "42");
        assert_eq!(entry.props[1], ("beg".to_string(), "42".to_string()));
        entry.set_prop("end", "50");
        assert_eq!(entry.props.len(), 3);
    }

    #[test]
    fn test_body_text_trims_surrounding_blank_lines() {
        let entry = EntrySection {
            heading: String::new(),
            props: Vec::new(),
            body: vec![String::new(), "a note".to_string(), String::new()],
        };
        assert_eq!(entry.body_text(), "a note");
    }

    #[test]
    fn test_serialize_skips_empty_drawer() {
        let doc = StoreDocument {
            preamble: Vec::new(),
            sections: vec![SourceSection {
                title: "T".to_string(),
                props: Vec::new(),
                body: vec!["hello".to_string()],
                entries: Vec::new(),
            }],
        };
        assert_eq!(doc.serialize(), "* T\nhello\n");
    }

    #[test]
    fn test_serialize_full_shape() {
        let doc = StoreDocument {
            preamble: vec!["# notes".to_string()],
            sections: vec![SourceSection {
                title: "Doc".to_string(),
                props: vec![(SOURCE_KEY.to_string(), "a.txt".to_string())],
                body: Vec::new(),
                entries: vec![EntrySection {
                    heading: "an excerpt".to_string(),
                    props: vec![
                        (ID_KEY.to_string(), "abcd1234".to_string()),
                        (BEG_KEY.to_string(), "10".to_string()),
                        (END_KEY.to_string(), "20".to_string()),
                    ],
                    body: vec!["my thoughts".to_string()],
                }],
            }],
        };
        let text = doc.serialize();
        assert_eq!(
            text,
            "# notes\n* Doc\n:PROPERTIES:\n:source: a.txt\n:END:\n\
             ** an excerpt\n:PROPERTIES:\n:id: abcd1234\n:beg: 10\n:end: 20\n:END:\n\
             my thoughts\n"
        );
    }
}
