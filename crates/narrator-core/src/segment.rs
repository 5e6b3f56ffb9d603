//! Text splitting for resumable narration.
//!
//! A page is spoken one unit at a time so a pause can take effect between
//! sentences instead of only at page boundaries. Both functions here are pure.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_HYPHENATED_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\r?\n[ \t]*(\p{Ll})").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Punctuation that ends a unit when followed by whitespace.
const TERMINALS: &[char] = &['.', '!', '?', '…'];
/// Full-width terminals end a unit on their own; CJK text has no spaces.
const WIDE_TERMINALS: &[char] = &['。', '！', '？'];
/// Closers that stay attached to the sentence they end.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '»', '”', '’', '」', '』'];

/// Clean up text extracted from a PDF text layer before segmentation.
///
/// Applies NFKC (ligatures like `ﬁ` become `fi`), joins words hyphenated across
/// line breaks and collapses whitespace runs into single spaces.
pub fn prepare_page_text(raw: &str) -> String {
    let normalized: String = raw.nfkc().collect();
    let joined = RE_HYPHENATED_BREAK.replace_all(&normalized, "$1$2");
    RE_WHITESPACE.replace_all(joined.trim(), " ").into_owned()
}

/// Split text into sentence-like narration units.
///
/// Units are trimmed and never empty; text without any boundary is a single
/// unit and blank text yields none.
pub fn segment(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        let wide = WIDE_TERMINALS.contains(&ch);
        if !wide && !TERMINALS.contains(&ch) {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if is_terminal(next) || CLOSERS.contains(&next) {
                current.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some(next) => wide || next.is_whitespace(),
        };
        if at_boundary {
            push_unit(&mut units, &mut current);
        }
    }
    push_unit(&mut units, &mut current);

    units
}

fn is_terminal(ch: char) -> bool {
    TERMINALS.contains(&ch) || WIDE_TERMINALS.contains(&ch)
}

fn push_unit(units: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        units.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation_followed_by_space() {
        let units = segment("First one. Second one! Third? Tail without stop");
        assert_eq!(
            units,
            vec!["First one.", "Second one!", "Third?", "Tail without stop"]
        );
    }

    #[test]
    fn keeps_decimals_and_inner_dots() {
        let units = segment("Pi is 3.14 roughly. See fig.2 for details.");
        assert_eq!(units, vec!["Pi is 3.14 roughly.", "See fig.2 for details."]);
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let units = segment("He said \"Stop!\" Then he left... Done.");
        assert_eq!(units, vec!["He said \"Stop!\"", "Then he left...", "Done."]);
    }

    #[test]
    fn text_without_boundary_is_one_unit() {
        assert_eq!(segment("  just a heading  "), vec!["just a heading"]);
    }

    #[test]
    fn blank_text_has_no_units() {
        assert!(segment("").is_empty());
        assert!(segment(" \n\t ").is_empty());
    }

    #[test]
    fn wide_terminals_split_without_spaces() {
        assert_eq!(segment("你好。再见！"), vec!["你好。", "再见！"]);
    }

    #[test]
    fn prepares_pdf_text_layer() {
        let raw = "The ﬁrst exam-\nple wraps\n\n  across   lines.";
        assert_eq!(
            prepare_page_text(raw),
            "The first example wraps across lines."
        );
    }

    #[test]
    fn keeps_hyphen_before_capitalized_word() {
        assert_eq!(prepare_page_text("Jean-\nPaul"), "Jean- Paul");
    }
}
