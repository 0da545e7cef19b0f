//! Edit notifications and span re-anchoring.
//!
//! Each text mutation is described by a [`TextEdit`]: the range of chars it
//! replaced and the end of the replacement. Tracked spans are re-anchored by
//! applying the edit to both endpoints with Emacs-overlay default semantics:
//! text inserted exactly at `beg` lands inside the span, text inserted
//! exactly at `end` lands outside.

use crate::highlight::Span;

/// A single replacement of `[start, old_end)` with text ending at `new_end`.
///
/// Insertions have `start == old_end`; deletions have `start == new_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub old_end: usize,
    pub new_end: usize,
}

impl TextEdit {
    /// An insertion of `len` chars at `at`.
    pub const fn insertion(at: usize, len: usize) -> Self {
        Self {
            start: at,
            old_end: at,
            new_end: at + len,
        }
    }

    /// A deletion of `[beg, end)`.
    pub const fn deletion(beg: usize, end: usize) -> Self {
        Self {
            start: beg,
            old_end: end,
            new_end: beg,
        }
    }

    /// Signed char delta (positive for growth).
    pub const fn delta(&self) -> i64 {
        self.new_end as i64 - self.old_end as i64
    }

    /// Re-anchor a single position.
    ///
    /// Positions at or before the edit start are untouched, positions at or
    /// past the old end shift by the delta, and positions interior to the
    /// replaced range clamp to the edit start.
    pub fn adjust_position(&self, pos: usize) -> usize {
        if pos <= self.start {
            pos
        } else if pos >= self.old_end {
            apply_delta(pos, self.delta())
        } else {
            self.start
        }
    }

    /// Re-anchor a whole span. A span fully inside a deletion collapses to
    /// the degenerate state at the edit start.
    pub fn adjust_span(&self, span: Span) -> Span {
        Span::new(self.adjust_position(span.beg), self.adjust_position(span.end))
    }
}

/// Apply a signed delta with saturation so a large deletion can never push
/// a position below zero.
fn apply_delta(position: usize, delta: i64) -> usize {
    usize::try_from((position as i64).saturating_add(delta).max(0)).unwrap_or(0)
}
