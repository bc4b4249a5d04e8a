use proptest::prelude::*;

use hercules_runner::diagnostics::{bounded_message, strip_ansi, Transcript};

/// Visible text without ESC.
fn visible_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9 ,.:;()'\"\\n\\t\\[\\]-]{0,80}").unwrap()
}

fn escape_sequence() -> impl Strategy<Value = String> {
    prop_oneof![
        // SGR colours.
        (0u8..108).prop_map(|n| format!("\x1b[{n}m")),
        (0u8..10, 0u8..108).prop_map(|(a, b)| format!("\x1b[{a};{b}m")),
        // Cursor movement and erase.
        Just("\x1b[2K".to_string()),
        Just("\x1b[1A".to_string()),
        // Window title (OSC) with both terminators.
        "[a-z ]{0,12}".prop_map(|t| format!("\x1b]0;{t}\x07")),
        "[a-z ]{0,12}".prop_map(|t| format!("\x1b]2;{t}\x1b\\")),
    ]
}

proptest! {
    #[test]
    fn stripping_removes_every_escape_and_keeps_visible_text(
        chunks in proptest::collection::vec((visible_text(), escape_sequence()), 0..8),
        tail in visible_text(),
    ) {
        let mut decorated = String::new();
        let mut plain = String::new();
        for (text, esc) in &chunks {
            decorated.push_str(text);
            decorated.push_str(esc);
            plain.push_str(text);
        }
        decorated.push_str(&tail);
        plain.push_str(&tail);

        let stripped = strip_ansi(&decorated);
        prop_assert!(!stripped.contains('\x1b'));
        prop_assert_eq!(stripped, plain);
    }

    #[test]
    fn plain_text_is_untouched(text in visible_text()) {
        prop_assert_eq!(strip_ansi(&text), text);
    }

    #[test]
    fn bounded_message_never_exceeds_its_cap(
        text in "\\PC{0,300}",
        cap in 1usize..120,
    ) {
        let msg = bounded_message(&text, cap);
        prop_assert!(msg.chars().count() <= cap);
        prop_assert!(!msg.contains('\x1b'));
    }

    #[test]
    fn transcript_never_exceeds_its_budget(
        entries in proptest::collection::vec("\\PC{0,200}", 0..40),
    ) {
        let mut transcript = Transcript::new(50, 400);
        for e in &entries {
            transcript.record("entry", e);
        }
        let total: usize = transcript.entries().iter().map(|e| e.text.chars().count()).sum();
        // Budget plus the single overflow notice.
        prop_assert!(total <= 400 + "[transcript truncated]".len());
    }
}
