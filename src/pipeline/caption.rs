//! Caption text: payload → the few short lines printed under each QR image.
//!
//! The PDF uses a built-in Type 1 font, which only covers Latin-1, and each
//! caption band has room for a handful of lines. The rules below run in a
//! fixed order: strip invisible characters before collapsing whitespace so
//! removed characters never leave double spaces behind, and wrap before
//! truncating so the ellipsis lands on the last visible line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker appended to text that was cut short.
pub const ELLIPSIS: &str = "...";

/// Turn a payload into at most `max_lines` lines of at most `max_chars` chars.
///
/// 1. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 2. Replace characters the built-in PDF font cannot draw with `?`
/// 3. Collapse all whitespace runs (including newlines) to one space
/// 4. Greedy word-wrap; words longer than a line are hard-split
/// 5. Truncate to `max_lines`, ending the last line with `...`
pub fn caption_lines(payload: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    if max_chars == 0 || max_lines == 0 {
        return Vec::new();
    }
    let s = remove_invisible_chars(payload);
    let s = replace_unencodable(&s);
    let s = collapse_whitespace(&s);
    let lines = wrap_words(&s, max_chars);
    truncate_lines(lines, max_chars, max_lines)
}

/// Single-line preview: first `max_chars` characters plus `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let flat = collapse_whitespace(&remove_invisible_chars(text));
    if flat.chars().count() > max_chars {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{head}{ELLIPSIS}")
    } else {
        flat
    }
}

// ── Rule 1: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 2: Replace characters outside Latin-1 ───────────────────────────────

fn replace_unencodable(input: &str) -> String {
    input
        .chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

// ── Rule 3: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}

// ── Rule 4: Word wrap ────────────────────────────────────────────────────────

fn wrap_words(input: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in input.split(' ').filter(|w| !w.is_empty()) {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        // Hard-split words that cannot fit on a line of their own.
        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(max_chars).peekable();
        while let Some(chunk) = chunks.next() {
            if chunks.peek().is_some() {
                lines.push(chunk.iter().collect());
            } else {
                current = chunk.iter().collect();
                current_len = chunk.len();
            }
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

// ── Rule 5: Truncate ─────────────────────────────────────────────────────────

fn truncate_lines(mut lines: Vec<String>, max_chars: usize, max_lines: usize) -> Vec<String> {
    if lines.len() <= max_lines {
        return lines;
    }
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        let keep = max_chars.saturating_sub(ELLIPSIS.len());
        let head: String = last.chars().take(keep).collect();
        *last = format!("{}{ELLIPSIS}", head.trim_end());
    }
    lines
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payload_is_one_line() {
        assert_eq!(caption_lines("sku: A1 | name: Widget", 40, 3), vec!["sku: A1 | name: Widget"]);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = caption_lines("aaa bbb ccc ddd", 7, 5);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn long_words_are_split() {
        let lines = caption_lines("abcdefghij", 4, 5);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn truncates_with_ellipsis() {
        let lines = caption_lines("one two three four five six seven", 9, 2);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(ELLIPSIS));
        assert!(lines.iter().all(|l| l.chars().count() <= 9));
    }

    #[test]
    fn invisible_and_non_latin_chars() {
        let lines = caption_lines("a\u{200B}b name: 東京", 40, 2);
        assert_eq!(lines, vec!["ab name: ??"]);
    }

    #[test]
    fn newlines_collapse() {
        assert_eq!(caption_lines("a:\r\n  1\t| b: 2", 40, 2), vec!["a: 1 | b: 2"]);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert!(caption_lines("abc", 0, 3).is_empty());
        assert!(caption_lines("abc", 10, 0).is_empty());
    }

    #[test]
    fn preview_truncation() {
        assert_eq!(truncate_preview("abcdef", 3), "abc...");
        assert_eq!(truncate_preview("abc", 3), "abc");
    }
}
