//! # Line Scanner
//!
//! Incremental line reader over a node's diagnostic stream.
//!
//! Each call to [`LineScanner::next_line`] yields one decoded line. EOF and
//! read errors are terminal: once either has been seen the scanner never
//! touches the stream again and keeps returning `Ok(None)`.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

/// Default upper bound for a single buffered line (64 KiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Lazy, finite sequence of text lines read from a byte stream
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: R,
    max_line_bytes: usize,
    lines_read: u64,
    lines_truncated: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> LineScanner<BufReader<R>> {
    /// Wrap a raw stream with the default line bound
    pub fn new(stream: R) -> Self {
        Self::with_limit(stream, DEFAULT_MAX_LINE_BYTES)
    }

    /// Wrap a raw stream, truncating lines longer than `max_line_bytes`
    pub fn with_limit(stream: R, max_line_bytes: usize) -> Self {
        Self::from_buffered(BufReader::new(stream), max_line_bytes)
    }
}

impl<R: AsyncBufRead + Unpin> LineScanner<R> {
    /// Wrap an already-buffered reader
    pub fn from_buffered(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes: max_line_bytes.max(1),
            lines_read: 0,
            lines_truncated: 0,
            finished: false,
        }
    }

    /// Number of lines yielded so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Number of yielded lines that were cut at the line bound
    pub fn lines_truncated(&self) -> u64 {
        self.lines_truncated
    }

    /// Whether EOF or an error has ended the sequence
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` at end of input. A trailing `\r` is stripped and
    /// invalid UTF-8 is replaced. Bytes past `max_line_bytes` are dropped up
    /// to the next newline.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        // One spare byte holds a trailing `\r` that is stripped below
        let capacity = self.max_line_bytes.saturating_add(1);
        let mut line = Vec::new();
        let mut overflowed = false;

        loop {
            let available = match self.reader.fill_buf().await {
                Ok(buf) => buf,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };

            if available.is_empty() {
                self.finished = true;
                if line.is_empty() && !overflowed {
                    return Ok(None);
                }
                break;
            }

            let (chunk, consumed, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (&available[..pos], pos + 1, true),
                None => (available, available.len(), false),
            };

            let room = capacity.saturating_sub(line.len());
            if chunk.len() > room {
                overflowed = true;
                line.extend_from_slice(&chunk[..room]);
            } else {
                line.extend_from_slice(chunk);
            }

            self.reader.consume(consumed);
            if complete {
                break;
            }
        }

        if !overflowed && line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.len() > self.max_line_bytes {
            line.truncate(self.max_line_bytes);
            overflowed = true;
        }

        if overflowed {
            self.lines_truncated += 1;
            tracing::warn!(
                limit = self.max_line_bytes,
                line = self.lines_read + 1,
                "Diagnostic line exceeded limit, truncated"
            );
        }

        self.lines_read += 1;
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
