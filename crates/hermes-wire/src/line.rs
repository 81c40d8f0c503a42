//! v1 text protocol helpers

use std::borrow::Cow;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use hermes_core::{HermesError, HermesResult, Message};

/// Longest line accepted from a client, newline included
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Outbound line for a delivered message
pub fn v1_line(msg: &Message) -> String {
    let mut line = String::with_capacity(msg.content.len() + 1);
    line.push_str(&msg.content);
    line.push('\n');
    line
}

/// Content of an inbound line, or `None` for a blank line
pub fn parse_v1_line(line: &str) -> Option<&str> {
    let content = line.trim();
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Text of a raw line; bytes that are not UTF-8 become U+FFFD
pub fn line_text(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(raw)
}

/// Append bytes up to and including the next `\n` to `buf`
///
/// Returns the number of bytes appended; 0 means end of stream. A line longer
/// than `max` bytes fails with `FrameTooLarge` before it is fully buffered.
pub async fn read_line_bounded<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> HermesResult<usize>
where
    R: AsyncBufRead + Unpin,
{
    let start = buf.len();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(buf.len() - start);
        }

        let (done, used) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (true, i + 1),
            None => (false, available.len()),
        };
        let size = buf.len() - start + used;
        if size > max {
            return Err(HermesError::FrameTooLarge { size, max });
        }

        buf.extend_from_slice(&available[..used]);
        reader.consume(used);
        if done {
            return Ok(buf.len() - start);
        }
    }
}
