//! Live, edit-resilient set of highlights for one document.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::TextEdit;

use super::{Highlight, HighlightId, PenStyle, Span};

/// Result of a navigation query over tracked highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The start offset of the highlight to move to.
    Moved(usize),
    /// The tracked set is empty.
    NoHighlights,
    /// Highlights exist but none are currently visible.
    NoneVisible,
}

/// Ordered collection of live [`Highlight`]s for a single document.
///
/// Spans auto-adjust via [`SpanTracker::apply_edit`], which the owning
/// document must invoke on every insert and delete.
#[derive(Debug, Default)]
pub struct SpanTracker {
    highlights: Vec<Highlight>,
    next_seq: u64,
    shown: bool,
}

impl SpanTracker {
    pub fn new() -> Self {
        Self {
            highlights: Vec::new(),
            next_seq: 0,
            shown: true,
        }
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Highlight> {
        self.highlights.iter()
    }

    pub fn get(&self, id: &HighlightId) -> Option<&Highlight> {
        self.highlights.iter().find(|hl| hl.id() == id)
    }

    pub fn get_mut(&mut self, id: &HighlightId) -> Option<&mut Highlight> {
        self.highlights.iter_mut().find(|hl| hl.id() == id)
    }

    /// Register a new tracked highlight. Generates a fresh id when `id` is
    /// `None`. The span starts adjusting on the next edit notification.
    pub fn create(
        &mut self,
        span: Span,
        label: Option<String>,
        style: PenStyle,
        properties: BTreeMap<String, String>,
        id: Option<HighlightId>,
    ) -> HighlightId {
        let id = id.unwrap_or_else(HighlightId::generate);
        let seq = self.next_seq;
        self.next_seq += 1;
        let mut hl = Highlight::new(id.clone(), span, label, style, properties, seq);
        if !self.shown {
            hl.hide();
        }
        self.highlights.push(hl);
        id
    }

    /// Detach a highlight from the tracked set. The store entry, if any,
    /// is untouched.
    pub fn remove(&mut self, id: &HighlightId) -> Option<Highlight> {
        let idx = self.highlights.iter().position(|hl| hl.id() == id)?;
        Some(self.highlights.remove(idx))
    }

    /// Reorder the tracked set ascending by span start. Must run after any
    /// mutation that can change relative order, before navigation queries.
    pub fn sort(&mut self) {
        self.highlights.sort_by_key(|hl| hl.span().beg);
    }

    /// Re-anchor every tracked span after a text edit.
    pub fn apply_edit(&mut self, edit: &TextEdit) {
        for hl in &mut self.highlights {
            *hl.span_mut() = edit.adjust_span(hl.span());
        }
    }

    /// Remove every highlight whose span has collapsed to zero width and
    /// return them so the caller can clean up store entries.
    pub fn prune_degenerate(&mut self) -> Vec<Highlight> {
        let mut pruned = Vec::new();
        self.highlights.retain_mut(|hl| {
            if hl.span().is_degenerate() {
                debug!(id = %hl.id(), "pruning degenerate highlight");
                pruned.push(hl.clone());
                false
            } else {
                true
            }
        });
        pruned
    }

    /// Start offsets of highlights visible per `is_visible`, ascending
    /// (descending when `reverse`). Assumes the set is sorted.
    pub fn positions_visible(&self, reverse: bool, is_visible: &dyn Fn(usize) -> bool) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .highlights
            .iter()
            .map(|hl| hl.span().beg)
            .filter(|&beg| is_visible(beg))
            .collect();
        if reverse {
            positions.reverse();
        }
        positions
    }

    /// First highlight covering `offset`, most recently created winning ties.
    pub fn find_at(&self, offset: usize) -> Option<&Highlight> {
        self.highlights
            .iter()
            .filter(|hl| hl.span().contains(offset))
            .max_by_key(|hl| hl.seq())
    }

    /// First highlight overlapping `[beg, end)`, optionally filtered to an
    /// exact id. Ties go to the most recently created.
    pub fn find_in(&self, beg: usize, end: usize, id: Option<&HighlightId>) -> Option<&Highlight> {
        self.highlights
            .iter()
            .filter(|hl| hl.span().overlaps(beg, end))
            .filter(|hl| id.is_none_or(|want| hl.id() == want))
            .max_by_key(|hl| hl.seq())
    }

    /// First visible start offset strictly after `cursor`, wrapping to the
    /// first visible position when none follows.
    pub fn next_from(&self, cursor: usize, is_visible: &dyn Fn(usize) -> bool) -> NavOutcome {
        if self.highlights.is_empty() {
            return NavOutcome::NoHighlights;
        }
        let positions = self.positions_visible(false, is_visible);
        let Some(&first) = positions.first() else {
            return NavOutcome::NoneVisible;
        };
        let target = positions.iter().copied().find(|&pos| pos > cursor);
        NavOutcome::Moved(target.unwrap_or(first))
    }

    /// First visible start offset strictly before `cursor`, scanning
    /// descending, wrapping to the last visible position.
    pub fn prev_from(&self, cursor: usize, is_visible: &dyn Fn(usize) -> bool) -> NavOutcome {
        if self.highlights.is_empty() {
            return NavOutcome::NoHighlights;
        }
        let positions = self.positions_visible(true, is_visible);
        let Some(&last) = positions.first() else {
            return NavOutcome::NoneVisible;
        };
        let target = positions.iter().copied().find(|&pos| pos < cursor);
        NavOutcome::Moved(target.unwrap_or(last))
    }

    /// Hide all highlights if shown, restore them if hidden. Returns true
    /// when the set is visible afterwards. Spans and ids are untouched.
    pub fn toggle_visibility(&mut self) -> bool {
        self.shown = !self.shown;
        for hl in &mut self.highlights {
            if self.shown {
                hl.show();
            } else {
                hl.hide();
            }
        }
        self.shown
    }

    pub const fn is_shown(&self) -> bool {
        self.shown
    }
}
