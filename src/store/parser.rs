//! Line-based parser for the notes store format.
//!
//! Headings open sections (`* ` top-level, `** ` child), a `:PROPERTIES:` /
//! `:END:` drawer immediately after a heading carries that section's
//! properties, and everything else is body text preserved verbatim. Deeper
//! headings (`*** ` and beyond) are treated as body so annotations can carry
//! their own structure.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{EntrySection, SourceSection, StoreDocument};

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*{1,2}) (.*)$").expect("heading pattern"));
static PROP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([^:\s][^:]*):\s*(.*)$").expect("property pattern"));

const DRAWER_START: &str = ":PROPERTIES:";
const DRAWER_END: &str = ":END:";

/// Parse store text into a [`StoreDocument`].
///
/// Never fails: malformed structure degrades to body text rather than being
/// dropped, so a hand-edited store is never destroyed by a rewrite.
pub fn parse(text: &str) -> StoreDocument {
    let mut doc = StoreDocument::default();
    let mut lines = text.lines().peekable();

    // Target for body lines: the preamble until the first heading, then the
    // most recently opened section or entry.
    enum Target {
        Preamble,
        Section,
        Entry,
    }
    let mut target = Target::Preamble;

    while let Some(line) = lines.next() {
        if let Some(caps) = HEADING.captures(line) {
            let stars = caps.get(1).map_or(0, |m| m.as_str().len());
            let heading = caps.get(2).map_or("", |m| m.as_str()).to_string();
            match stars {
                1 => {
                    doc.sections.push(SourceSection {
                        title: heading,
                        props: read_drawer(&mut lines),
                        body: Vec::new(),
                        entries: Vec::new(),
                    });
                    target = Target::Section;
                    continue;
                }
                2 if !doc.sections.is_empty() => {
                    let section = doc.sections.last_mut().expect("non-empty sections");
                    section.entries.push(EntrySection {
                        heading,
                        props: read_drawer(&mut lines),
                        body: Vec::new(),
                    });
                    target = Target::Entry;
                    continue;
                }
                // A child heading before any top-level section: body text.
                _ => {}
            }
        }

        let line = line.to_string();
        match target {
            Target::Preamble => doc.preamble.push(line),
            Target::Section => {
                doc.sections
                    .last_mut()
                    .expect("section target")
                    .body
                    .push(line);
            }
            Target::Entry => {
                doc.sections
                    .last_mut()
                    .expect("section target")
                    .entries
                    .last_mut()
                    .expect("entry target")
                    .body
                    .push(line);
            }
        }
    }

    doc
}

/// Consume a property drawer if one starts at the current line.
fn read_drawer(lines: &mut std::iter::Peekable<std::str::Lines<'_>>) -> Vec<(String, String)> {
    if lines.peek().map(|l| l.trim_end()) != Some(DRAWER_START) {
        return Vec::new();
    }
    lines.next();

    let mut props = Vec::new();
    for line in lines.by_ref() {
        if line.trim_end() == DRAWER_END {
            break;
        }
        if let Some(caps) = PROP_LINE.captures(line) {
            let key = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let value = caps.get(2).map_or("", |m| m.as_str()).to_string();
            props.push((key, value));
        }
    }
    props
}
