//! Page ranges and the reader's read modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive, zero-based page interval, always within `[0, total_pages)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: usize,
    end: usize,
}

impl PageRange {
    /// Clamp `from`/`to` into the document and raise `to` to `from` when the
    /// bounds are inverted. `None` when the document has no pages.
    pub fn clamped(from: usize, to: usize, total_pages: usize) -> Option<Self> {
        let last = total_pages.checked_sub(1)?;
        let start = from.min(last);
        let end = to.min(last).max(start);
        Some(Self { start, end })
    }

    pub fn whole(total_pages: usize) -> Option<Self> {
        Self::clamped(0, usize::MAX, total_pages)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn contains(&self, page: usize) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start + 1, self.end + 1)
    }
}

/// What the reader asked to hear, relative to the page on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// From the current page to the end of the document.
    #[default]
    FromCurrent,
    /// The current page only.
    OnlyCurrent,
    /// The whole document.
    All,
    /// An explicit zero-based range.
    Range { from: usize, to: usize },
}

impl ReadMode {
    pub fn resolve(self, current_page: usize, total_pages: usize) -> Option<PageRange> {
        match self {
            ReadMode::FromCurrent => PageRange::clamped(current_page, usize::MAX, total_pages),
            ReadMode::OnlyCurrent => PageRange::clamped(current_page, current_page, total_pages),
            ReadMode::All => PageRange::whole(total_pages),
            ReadMode::Range { from, to } => PageRange::clamped(from, to, total_pages),
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::FromCurrent => write!(f, "from current page"),
            ReadMode::OnlyCurrent => write!(f, "current page only"),
            ReadMode::All => write!(f, "whole document"),
            ReadMode::Range { from, to } => write!(f, "pages {}-{}", from + 1, to + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_bounds() {
        let range = PageRange::clamped(3, 99, 5).unwrap();
        assert_eq!((range.start(), range.end()), (3, 4));
        let range = PageRange::clamped(42, 7, 5).unwrap();
        assert_eq!((range.start(), range.end()), (4, 4));
    }

    #[test]
    fn inverted_bounds_collapse_to_start() {
        let range = PageRange::clamped(3, 1, 10).unwrap();
        assert_eq!((range.start(), range.end()), (3, 3));
        assert_eq!(range.page_count(), 1);
    }

    #[test]
    fn empty_document_has_no_range() {
        assert!(PageRange::clamped(0, 0, 0).is_none());
        assert!(ReadMode::All.resolve(0, 0).is_none());
    }

    #[test]
    fn read_modes_resolve_against_current_page() {
        assert_eq!(
            ReadMode::FromCurrent.resolve(2, 6),
            PageRange::clamped(2, 5, 6)
        );
        assert_eq!(
            ReadMode::OnlyCurrent.resolve(2, 6),
            PageRange::clamped(2, 2, 6)
        );
        assert_eq!(ReadMode::All.resolve(2, 6), PageRange::clamped(0, 5, 6));
        assert_eq!(
            ReadMode::Range { from: 1, to: 3 }.resolve(5, 6),
            PageRange::clamped(1, 3, 6)
        );
    }

    #[test]
    fn displays_one_based_pages() {
        let range = PageRange::clamped(0, 4, 5).unwrap();
        assert_eq!(range.to_string(), "1-5");
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }
}
