// src/diagnostics/strip.rs

//! Terminal escape removal and message bounding.

use std::sync::LazyLock;

use regex::Regex;

/// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`),
/// two-byte `ESC <Fe>` escapes, and finally any lone ESC byte.
static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-_]|\x1b")
        .expect("escape regex is valid")
});

/// Remove terminal colour and control escape sequences.
///
/// Visible characters (including newlines and tabs) are left untouched.
pub fn strip_ansi(text: &str) -> String {
    if !text.contains('\x1b') {
        return text.to_string();
    }
    ESCAPE_RE.replace_all(text, "").into_owned()
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
///
/// Returns the (possibly shortened) text and how many characters were cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, usize) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let cut = text[byte_idx..].chars().count();
            (&text[..byte_idx], cut)
        }
        None => (text, 0),
    }
}

/// Produce a caller-facing error string: escapes stripped, whitespace
/// trimmed, and at most `max_chars` characters long.
pub fn bounded_message(text: &str, max_chars: usize) -> String {
    let clean = strip_ansi(text);
    let (head, _) = truncate_chars(clean.trim(), max_chars);
    head.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_codes() {
        let raw = "\x1b[31merror:\x1b[0m unexpected symbol near \x1b[1;33m'end'\x1b[0m";
        assert_eq!(strip_ansi(raw), "error: unexpected symbol near 'end'");
    }

    #[test]
    fn strips_osc_and_lone_escapes() {
        let raw = "\x1b]0;hercules\x07done\x1b";
        assert_eq!(strip_ansi(raw), "done");
    }

    #[test]
    fn leaves_plain_text_alone() {
        let raw = "line one\n\tline two [not an escape]";
        assert_eq!(strip_ansi(raw), raw);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let (head, cut) = truncate_chars("héllo wörld", 4);
        assert_eq!(head, "héll");
        assert_eq!(cut, 7);

        let (head, cut) = truncate_chars("short", 10);
        assert_eq!(head, "short");
        assert_eq!(cut, 0);
    }

    #[test]
    fn bounded_message_strips_trims_and_caps() {
        let raw = format!("  \x1b[31m{}\x1b[0m \n", "x".repeat(600));
        let msg = bounded_message(&raw, 500);
        assert_eq!(msg.len(), 500);
        assert!(!msg.contains('\x1b'));
    }
}
