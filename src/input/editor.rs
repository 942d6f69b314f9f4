//! IME editor state
//!
//! The text model counts in runes (Unicode scalar values); native text
//! input protocols count in UTF-16 code units. Only a snippet of the text
//! around the caret is known here, so index translation is exact inside
//! the snippet and assumes one unit per rune outside it.

use std::cmp::min;

use crate::unit::PointF;

/// Rune range; `{-1, -1}` means no range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: i32,
    pub end: i32,
}

impl Range {
    /// The "no range" sentinel
    pub const NONE: Range = Range { start: -1, end: -1 };

    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn is_none(&self) -> bool {
        *self == Range::NONE
    }

    /// Ordered, with negative endpoints moved to zero
    pub fn clamped(self) -> Self {
        let (start, end) = if self.start > self.end {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        };
        Self::new(start.max(0), end.max(0))
    }

    pub fn len(&self) -> i32 {
        self.end.saturating_sub(self.start).saturating_abs()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Caret geometry, for placing IME candidate windows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Caret {
    /// Baseline position of the caret in window pixels
    pub position: PointF,
    pub ascent: f32,
    pub descent: f32,
}

/// Selected range plus caret geometry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selection {
    pub range: Range,
    pub caret: Caret,
}

/// A window of the text around the caret
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snippet {
    pub range: Range,
    pub text: String,
}

/// Editing state shared with the native IME
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub selection: Selection,
    /// Composing (pre-edit) range, [`Range::NONE`] when not composing
    pub composing: Range,
    pub snippet: Snippet,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            composing: Range::NONE,
            snippet: Snippet::default(),
        }
    }
}

impl EditorState {
    pub fn is_composing(&self) -> bool {
        !self.composing.is_none()
    }

    /// Convert a rune index to a UTF-16 index
    pub fn utf16_index(&self, runes: i32) -> i32 {
        if runes == -1 {
            return -1;
        }
        let start = self.snippet.range.start;
        if runes < start {
            return runes;
        }
        let mut remaining = runes.saturating_sub(start);
        let mut units = start;
        for c in self.snippet.text.chars() {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            units = units.saturating_add(c.len_utf16() as i32);
        }
        units.saturating_add(remaining)
    }

    /// Convert a UTF-16 index to a rune index
    ///
    /// An index in the middle of a surrogate pair maps to the rune that
    /// contains it.
    pub fn rune_index(&self, units: i32) -> i32 {
        if units == -1 {
            return -1;
        }
        let start = self.snippet.range.start;
        if units < start {
            return units;
        }
        let mut remaining = units.saturating_sub(start);
        let mut runes = start;
        for c in self.snippet.text.chars() {
            if remaining <= 0 {
                break;
            }
            remaining -= c.len_utf16() as i32;
            runes = runes.saturating_add(1);
        }
        runes.saturating_add(remaining)
    }

    /// Replace the runes in `range` with `text`, keeping selection,
    /// composing range and snippet consistent
    ///
    /// Positions saturate at `i32::MAX`.
    pub fn replace(&mut self, range: Range, text: &str) {
        let r = range.clamped();
        let inserted = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
        let new_end = r.start.saturating_add(inserted);
        let adjust = |pos: i32| -> i32 {
            if pos > r.end {
                pos.saturating_add(new_end.saturating_sub(r.end))
            } else if pos > r.start || (pos == r.start && r.is_empty()) {
                new_end
            } else {
                pos
            }
        };

        self.selection.range.start = adjust(self.selection.range.start);
        self.selection.range.end = adjust(self.selection.range.end);
        if !self.composing.is_none() {
            self.composing.start = adjust(self.composing.start);
            self.composing.end = adjust(self.composing.end);
        }

        let snippet = &self.snippet;
        if r.end < snippet.range.start || r.start > snippet.range.end {
            // Edit does not touch the snippet; the backend must ask for a
            // fresh one
            self.snippet = Snippet {
                range: Range::new(r.start, r.start),
                text: String::new(),
            };
            return;
        }

        let chars: Vec<char> = snippet.text.chars().collect();
        let len = chars.len() as i32;
        let mut spliced = String::with_capacity(snippet.text.len() + text.len());
        let prefix = r.start.saturating_sub(snippet.range.start).clamp(0, len) as usize;
        spliced.extend(&chars[..prefix]);
        spliced.push_str(text);
        if r.end < snippet.range.end {
            let suffix = r.end.saturating_sub(snippet.range.start).clamp(0, len) as usize;
            spliced.extend(&chars[suffix..]);
        }

        let start = min(r.start, snippet.range.start);
        let count = i32::try_from(spliced.chars().count()).unwrap_or(i32::MAX);
        let end = start.saturating_add(count);
        self.snippet = Snippet {
            range: Range::new(start, end),
            text: spliced,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(start: i32, text: &str) -> EditorState {
        EditorState {
            snippet: Snippet {
                range: Range::new(start, start + text.chars().count() as i32),
                text: text.to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_sentinel_maps_to_itself() {
        let s = state(0, "a😀b");
        assert_eq!(s.utf16_index(-1), -1);
        assert_eq!(s.rune_index(-1), -1);
    }

    #[test]
    fn test_utf16_index_counts_surrogates() {
        let s = state(10, "a😀b");
        // Before the snippet: 1:1
        assert_eq!(s.utf16_index(3), 3);
        assert_eq!(s.utf16_index(10), 10);
        assert_eq!(s.utf16_index(11), 11);
        // After the emoji, one extra unit
        assert_eq!(s.utf16_index(12), 13);
        assert_eq!(s.utf16_index(13), 14);
        // After the snippet: 1:1 from its end
        assert_eq!(s.utf16_index(20), 21);
    }

    #[test]
    fn test_rune_index_inside_surrogate_pair() {
        let s = state(0, "😀x");
        assert_eq!(s.rune_index(0), 0);
        assert_eq!(s.rune_index(1), 0);
        assert_eq!(s.rune_index(2), 1);
        assert_eq!(s.rune_index(3), 2);
    }

    #[test]
    fn test_round_trip() {
        let s = state(4, "héllo 😀 wörld 𝄞!");
        for runes in 0..40 {
            assert_eq!(s.rune_index(s.utf16_index(runes)), runes, "rune {}", runes);
        }
    }

    #[test]
    fn test_insert_moves_caret_after_text() {
        let mut s = state(0, "abcde");
        s.selection.range = Range::new(5, 5);
        s.replace(Range::new(5, 5), "hello");
        assert_eq!(s.selection.range, Range::new(10, 10));
        assert_eq!(s.snippet.text, "abcdehello");
        assert_eq!(s.snippet.range, Range::new(0, 10));
    }

    #[test]
    fn test_replace_shifts_later_positions() {
        let mut s = state(0, "0123456789");
        s.selection.range = Range::new(8, 9);
        s.replace(Range::new(2, 4), "");
        assert_eq!(s.selection.range, Range::new(6, 7));
        assert_eq!(s.snippet.text, "01456789");
    }

    #[test]
    fn test_replace_clamps_positions_inside_range() {
        let mut s = state(0, "0123456789");
        s.selection.range = Range::new(1, 6);
        s.replace(Range::new(3, 8), "x");
        // Start before the edit stays, end inside clamps to the new end
        assert_eq!(s.selection.range, Range::new(1, 4));
    }

    #[test]
    fn test_replace_keeps_composing_over_new_text() {
        let mut s = state(0, "abcdef");
        s.composing = Range::new(2, 5);
        s.replace(Range::new(2, 5), "xy");
        assert_eq!(s.composing, Range::new(2, 4));
        assert_eq!(s.snippet.text, "abxyf");
    }

    #[test]
    fn test_replace_leaves_missing_composing_alone() {
        let mut s = state(0, "abc");
        s.replace(Range::new(0, 0), "z");
        assert!(!s.is_composing());
    }

    #[test]
    fn test_edit_outside_snippet_invalidates_it() {
        let mut s = state(100, "snippet");
        s.replace(Range::new(10, 12), "xyz");
        assert_eq!(s.snippet.range, Range::new(10, 10));
        assert!(s.snippet.text.is_empty());

        let mut s = state(0, "abc");
        s.replace(Range::new(50, 50), "q");
        assert_eq!(s.snippet.range, Range::new(50, 50));
    }

    #[test]
    fn test_edit_touching_snippet_edge_extends_it() {
        let mut s = state(5, "abc");
        s.replace(Range::new(3, 5), "xy");
        assert_eq!(s.snippet.range, Range::new(3, 8));
        assert_eq!(s.snippet.text, "xyabc");
    }

    #[test]
    fn test_malformed_ranges_are_clamped() {
        let mut s = state(0, "abc");
        s.selection.range = Range::new(3, 3);
        // Reversed and negative
        s.replace(Range::new(2, -4), "Z");
        assert_eq!(s.snippet.text, "Zc");
        assert_eq!(s.selection.range, Range::new(2, 2));

        // Snippet claims more runes than its text holds
        let mut s = EditorState {
            snippet: Snippet {
                range: Range::new(0, 10),
                text: "ab".into(),
            },
            ..Default::default()
        };
        s.replace(Range::new(6, 8), "!");
        assert_eq!(s.snippet.text, "ab!");
    }

    #[test]
    fn test_huge_ranges_saturate() {
        let mut s = EditorState::default();
        s.selection.range = Range::new(i32::MAX, i32::MAX);
        s.replace(Range::new(i32::MAX - 1, i32::MAX), "hello");
        assert_eq!(s.selection.range, Range::new(i32::MAX, i32::MAX));
        assert_eq!(s.snippet.range, Range::new(i32::MAX - 1, i32::MAX - 1));

        let s = state(i32::MAX - 3, "😀😀😀");
        assert_eq!(s.utf16_index(i32::MAX), i32::MAX);
        // Second unit of the second emoji
        assert_eq!(s.rune_index(i32::MAX), i32::MAX - 2);
        assert_eq!(Range::new(i32::MIN, i32::MAX).len(), i32::MAX);
    }
}
