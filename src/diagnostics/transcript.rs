// src/diagnostics/transcript.rs

use chrono::{DateTime, SecondsFormat, Utc};

use super::strip::{strip_ansi, truncate_chars};

/// One recorded line of the per-job transcript.
#[derive(Debug, Clone)]
pub struct Entry {
    pub at: DateTime<Utc>,
    pub label: String,
    pub text: String,
}

/// In-memory, length-capped diagnostic transcript for a single job.
///
/// Every entry is escape-stripped and truncated on the way in; the whole
/// transcript stops growing once `max_total_chars` is reached. The transcript
/// lives and dies with its job.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    max_entry_chars: usize,
    max_total_chars: usize,
    used_chars: usize,
    overflowed: bool,
}

impl Transcript {
    pub fn new(max_entry_chars: usize, max_total_chars: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entry_chars,
            max_total_chars,
            used_chars: 0,
            overflowed: false,
        }
    }

    pub fn record(&mut self, label: impl Into<String>, text: &str) {
        if self.overflowed {
            return;
        }

        let clean = strip_ansi(text);
        let (head, cut) = truncate_chars(&clean, self.max_entry_chars);
        let mut body = head.to_string();
        if cut > 0 {
            body.push_str(&format!("\n[... truncated {cut} chars]"));
        }

        let size = body.chars().count();
        if self.used_chars + size > self.max_total_chars {
            self.overflowed = true;
            self.entries.push(Entry {
                at: Utc::now(),
                label: "transcript".to_string(),
                text: "[transcript truncated]".to_string(),
            });
            return;
        }

        self.used_chars += size;
        self.entries.push(Entry {
            at: Utc::now(),
            label: label.into(),
            text: body,
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialise the transcript as one string, one block per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let stamp = entry.at.to_rfc3339_opts(SecondsFormat::Millis, true);
            if entry.text.contains('\n') {
                out.push_str(&format!("[{stamp}] {}:\n{}\n", entry.label, entry.text));
            } else {
                out.push_str(&format!("[{stamp}] {}: {}\n", entry.label, entry.text));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_stripped_and_timestamped() {
        let mut t = Transcript::new(100, 1000);
        t.record("stderr", "\x1b[31mboom\x1b[0m");

        assert_eq!(t.entries().len(), 1);
        assert_eq!(t.entries()[0].text, "boom");

        let rendered = t.render();
        assert!(rendered.starts_with('['));
        assert!(rendered.contains("stderr: boom"));
    }

    #[test]
    fn long_entries_are_truncated_with_marker() {
        let mut t = Transcript::new(10, 1000);
        t.record("stdout", &"a".repeat(25));
        assert!(t.entries()[0].text.starts_with("aaaaaaaaaa\n"));
        assert!(t.entries()[0].text.ends_with("[... truncated 15 chars]"));
    }

    #[test]
    fn total_cap_stops_growth() {
        let mut t = Transcript::new(100, 50);
        t.record("a", &"x".repeat(40));
        t.record("b", &"y".repeat(40));
        t.record("c", "never recorded");

        let labels: Vec<&str> = t.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "transcript"]);
        assert!(t.render().contains("[transcript truncated]"));
    }
}
