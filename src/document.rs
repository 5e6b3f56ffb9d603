//! Page-addressable text loaded from a PDF text export.
//!
//! `pdftotext` separates pages with form feeds; exports without them are cut
//! into fixed line-count pages instead.

use anyhow::{Context, Result, bail};
use narrator_core::DocumentSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PAGE_BREAK: char = '\u{0c}';

pub struct TextDocument {
    path: PathBuf,
    pages: Vec<String>,
}

impl TextDocument {
    pub fn open(path: &Path, lines_per_page: usize) -> Result<Self> {
        info!(path = %path.display(), "Loading document text");
        let bytes = fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let doc = Self::from_text(path.to_path_buf(), &text, lines_per_page);
        info!(
            path = %doc.path.display(),
            pages = doc.pages.len(),
            "Document ready"
        );
        Ok(doc)
    }

    fn from_text(path: PathBuf, text: &str, lines_per_page: usize) -> Self {
        let pages = if text.contains(PAGE_BREAK) {
            split_form_feeds(text)
        } else {
            debug!(lines_per_page, "No page breaks found; chunking by lines");
            chunk_lines(text, lines_per_page.max(1))
        };
        Self { path, pages }
    }
}

fn split_form_feeds(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    // pdftotext terminates the last page with a form feed too.
    if pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn chunk_lines(text: &str, lines_per_page: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = text.lines().collect();
    lines
        .chunks(lines_per_page)
        .map(|chunk| chunk.join("\n"))
        .collect()
}

impl DocumentSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String> {
        match self.pages.get(page) {
            Some(text) => Ok(text.clone()),
            None => bail!(
                "page {} out of bounds for {} ({} pages)",
                page + 1,
                self.path.display(),
                self.pages.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, lines_per_page: usize) -> TextDocument {
        TextDocument::from_text(PathBuf::from("book.txt"), text, lines_per_page)
    }

    #[test]
    fn splits_on_form_feeds() {
        let doc = doc("First page.\n\x0cSecond page.\n\x0c\x0cFourth.\n\x0c", 60);
        assert_eq!(doc.page_count(), 4);
        assert_eq!(doc.page_text(1).unwrap(), "Second page.\n");
        assert_eq!(doc.page_text(2).unwrap(), "");
        assert_eq!(doc.page_text(3).unwrap(), "Fourth.\n");
    }

    #[test]
    fn chunks_plain_text_by_lines() {
        let doc = doc("a\nb\nc\nd\ne", 2);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_text(0).unwrap(), "a\nb");
        assert_eq!(doc.page_text(2).unwrap(), "e");
    }

    #[test]
    fn blank_file_has_no_pages() {
        assert_eq!(doc("  \n\n", 10).page_count(), 0);
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let err = doc("Only.", 10).page_text(3).unwrap_err();
        assert!(err.to_string().contains("page 4 out of bounds"));
    }

    #[test]
    fn zero_lines_per_page_is_treated_as_one() {
        assert_eq!(doc("a\nb", 0).page_count(), 2);
    }

    #[test]
    fn open_reports_missing_files() {
        let err = TextDocument::open(Path::new("/nonexistent/book.txt"), 10)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("Reading /nonexistent/book.txt"));
    }
}
