// src/exec/capture.rs

//! Bounded stream capture for child stdout/stderr.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes kept from one stream plus how many were discarded past the cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: u64,
}

impl Captured {
    /// Lossy UTF-8 text with a `[... truncated N bytes]` marker when the cap
    /// was hit. The boolean reports whether truncation happened.
    pub fn into_text(self) -> (String, bool) {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        let truncated = self.dropped > 0;
        if truncated {
            if !text.ends_with('\n') && !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("[... truncated {} bytes]", self.dropped));
        }
        (text, truncated)
    }
}

/// Read `reader` to EOF, keeping at most `cap` bytes.
///
/// Bytes past the cap are still drained so the child never blocks on a full
/// pipe; they are only counted.
pub async fn read_bounded<R>(mut reader: R, cap: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut out = Captured::default();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(out.bytes.len());
        let keep = room.min(n);
        out.bytes.extend_from_slice(&buf[..keep]);
        out.dropped += (n - keep) as u64;
    }
    Ok(out)
}
