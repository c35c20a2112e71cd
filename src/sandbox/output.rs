//! Output bounding shared by the executor and the shell runner.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Inserted between stdout and stderr when both are non-empty.
pub const STDERR_SEPARATOR: &str = "\n--- stderr ---\n";

/// Appended whenever the combined output was cut at the byte cap.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

const READ_CHUNK: usize = 8 * 1024;

/// Reads a stream to EOF, keeping at most `keep` bytes.
///
/// Everything past `keep` is drained and dropped so the child never
/// blocks on a full pipe while memory stays bounded.
pub async fn read_bounded<R>(reader: Option<R>, keep: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };

    let mut kept = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = keep.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(kept)
}

/// Joins stdout and stderr, then caps the result at `max_bytes`.
///
/// The cap applies to the joined text, separator included; a separator
/// that straddles the cap is cut like any other text.
pub fn combine_output(stdout: &[u8], stderr: &[u8], max_bytes: usize) -> (String, bool) {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);

    let mut combined = String::with_capacity(stdout.len() + stderr.len() + STDERR_SEPARATOR.len());
    combined.push_str(&stdout);
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push_str(STDERR_SEPARATOR);
        }
        combined.push_str(&stderr);
    }

    if combined.len() <= max_bytes {
        return (combined, false);
    }

    let mut truncated = truncate_utf8(&combined, max_bytes).to_string();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

/// Truncate a UTF-8 string at or before `max_bytes`, respecting char boundaries.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
