/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Bounded newline framing over an async byte stream.
//!
//! A bad line never ends the stream: over-long lines are skipped up to the
//! next `\n` and invalid UTF-8 is reported per line, so the caller can log it
//! and keep reading.

use crate::error::FrameError;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One line read off the wire, or the reason it cannot be decoded.
pub type Frame = Result<String, FrameError>;

/// Reads `\n`- or `\r\n`-terminated lines of at most `max_length` bytes.
///
/// # Examples
///
/// ```
/// use follower_relay::event::LineReader;
///
/// # async fn example() -> std::io::Result<()> {
/// let input: &[u8] = b"1|B\r\n2|S|7\n";
/// let mut lines = LineReader::new(input, 1024);
/// assert_eq!(lines.next_line().await?, Some(Ok("1|B".to_string())));
/// assert_eq!(lines.next_line().await?, Some(Ok("2|S|7".to_string())));
/// assert_eq!(lines.next_line().await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    max_length: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    /// Wraps a buffered reader.
    #[must_use]
    pub fn new(inner: R, max_length: usize) -> Self {
        Self {
            inner,
            max_length,
            buf: Vec::new(),
        }
    }

    /// Reads the next line.
    ///
    /// Returns `Ok(None)` at a clean end of stream. A final line without a
    /// terminator is still returned.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the read itself fails.
    pub async fn next_line(&mut self) -> io::Result<Option<Frame>> {
        self.buf.clear();
        let mut overflowed = false;
        let mut seen_any = false;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if !seen_any {
                    return Ok(None);
                }
                break;
            }
            seen_any = true;

            let newline = available.iter().position(|&b| b == b'\n');
            let take = newline.map_or(available.len(), |at| at + 1);
            if !overflowed {
                self.buf.extend_from_slice(&available[..take]);
                // Two bytes of slack for the terminator.
                if self.buf.len() > self.max_length.saturating_add(2) {
                    overflowed = true;
                    self.buf.clear();
                }
            }
            self.inner.consume(take);

            if newline.is_some() {
                break;
            }
        }

        if overflowed {
            return Ok(Some(Err(FrameError::TooLong {
                limit: self.max_length,
            })));
        }

        strip_terminator(&mut self.buf);
        if self.buf.len() > self.max_length {
            return Ok(Some(Err(FrameError::TooLong {
                limit: self.max_length,
            })));
        }

        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => Ok(Some(Ok(line))),
            Err(_) => Ok(Some(Err(FrameError::InvalidUtf8))),
        }
    }

    /// Returns the wrapped reader. Bytes already buffered by it are kept.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

// An unterminated last line may still end in `\r`.
fn strip_terminator(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}
