//! Codepoint coverage of a face, as declared by its `unicode-range`.

use alloc::vec::Vec;
use core::fmt;

/// Inclusive codepoint range, `U+start-end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnicodeRange {
    pub start: u32,
    pub end: u32,
}

impl UnicodeRange {
    pub const MAX_CODEPOINT: u32 = 0x10FFFF;

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn full() -> Self {
        Self {
            start: 0,
            end: Self::MAX_CODEPOINT,
        }
    }

    pub fn contains(&self, c: u32) -> bool {
        c >= self.start && c <= self.end
    }
}

impl fmt::Display for UnicodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "U+{:X}", self.start)
        } else {
            write!(f, "U+{:X}-{:X}", self.start, self.end)
        }
    }
}

/// Sorted, non-overlapping list of ranges. Empty means "everything".
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct UnicodeRangeSet {
    ranges: Vec<UnicodeRange>,
}

impl UnicodeRangeSet {
    pub fn new(mut ranges: Vec<UnicodeRange>) -> Self {
        ranges.retain(|r| r.start <= r.end);
        ranges.sort();

        let mut merged: Vec<UnicodeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end.saturating_add(1) => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        Self { ranges: merged }
    }

    pub fn is_entire_range(&self) -> bool {
        self.ranges.is_empty()
            || (self.ranges.len() == 1
                && self.ranges[0].start == 0
                && self.ranges[0].end >= UnicodeRange::MAX_CODEPOINT)
    }

    pub fn contains(&self, c: u32) -> bool {
        if self.is_entire_range() {
            return true;
        }
        let idx = self.ranges.partition_point(|r| r.end < c);
        self.ranges.get(idx).map_or(false, |r| r.contains(c))
    }

    pub fn intersects_with(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.is_entire_range() {
            return true;
        }
        text.chars().any(|c| self.contains(c as u32))
    }

    pub fn ranges(&self) -> &[UnicodeRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_and_adjacent_ranges_merge() {
        let set = UnicodeRangeSet::new(vec![
            UnicodeRange::new(0x100, 0x1FF),
            UnicodeRange::new(0x0, 0x7F),
            UnicodeRange::new(0x80, 0xFF),
            UnicodeRange::new(0x400, 0x4FF),
        ]);
        assert_eq!(
            set.ranges(),
            &[UnicodeRange::new(0x0, 0x1FF), UnicodeRange::new(0x400, 0x4FF)]
        );
        assert!(set.contains(0x41));
        assert!(!set.contains(0x300));
        assert!(set.contains(0x4FF));
    }

    #[test]
    fn empty_set_covers_everything() {
        let set = UnicodeRangeSet::default();
        assert!(set.is_entire_range());
        assert!(set.contains(0x1F600));
        assert!(set.intersects_with("x"));
        assert!(!set.intersects_with(""));
    }

    #[test]
    fn intersects_with_text() {
        let cyrillic = UnicodeRangeSet::new(vec![UnicodeRange::new(0x400, 0x4FF)]);
        assert!(!cyrillic.intersects_with("hello"));
        assert!(cyrillic.intersects_with("hello мир"));
    }

    #[test]
    fn display_matches_css_serialization() {
        assert_eq!(UnicodeRange::new(0x41, 0x41).to_string(), "U+41");
        assert_eq!(UnicodeRange::full().to_string(), "U+0-10FFFF");
    }
}
