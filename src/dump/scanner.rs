//! Statement boundary scanner.
//!
//! Reads a dump line by line, skips blank and comment lines, and accumulates
//! the remaining bytes until a line ends with the statement terminator.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::debug;

use super::RawStatement;
use crate::error::{ReplayError, Result};

/// Default ceiling for a single statement (10 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 10 * 1024 * 1024;

const TERMINATOR: u8 = b';';

/// Lazily produces complete statements from a buffered byte stream.
///
/// The sequence is finite and cannot be restarted: once the stream is
/// exhausted or an error has been returned, every further call yields `None`.
pub struct StatementScanner<R> {
    reader: R,
    max_size: usize,
    line: Vec<u8>,
    accum: Vec<u8>,
    lines_read: u64,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> StatementScanner<R> {
    /// Creates a scanner that refuses statements larger than `max_size` bytes.
    pub fn new(reader: R, max_size: usize) -> Self {
        Self {
            reader,
            max_size,
            line: Vec::new(),
            accum: Vec::new(),
            lines_read: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far, including skipped ones.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Returns the next complete statement, or `None` at end of stream.
    ///
    /// A trailing fragment without a terminator is dropped at end of stream.
    pub async fn next_statement(&mut self) -> Result<Option<RawStatement>> {
        if self.done {
            return Ok(None);
        }

        match self.advance().await {
            Ok(Some(stmt)) => Ok(Some(stmt)),
            Ok(None) => {
                self.done = true;
                if !self.accum.is_empty() {
                    debug!(
                        bytes = self.accum.len(),
                        "Dropping unterminated statement at end of stream"
                    );
                    self.accum.clear();
                }
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                self.accum.clear();
                Err(e)
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<RawStatement>> {
        while self.read_line().await? {
            let line = self.line.as_slice();

            if line.is_empty() || line[0] == b'-' || line[0] == b'/' {
                continue;
            }

            if self.accum.len() + line.len() > self.max_size {
                return Err(ReplayError::config(format!(
                    "statement starting at line {} exceeds buffer size of {} bytes",
                    self.lines_read, self.max_size
                )));
            }

            self.accum.extend_from_slice(line);

            if line.last() == Some(&TERMINATOR) {
                return Ok(Some(RawStatement::new(std::mem::take(&mut self.accum))));
            }
        }

        Ok(None)
    }

    /// Reads one line into `self.line` without its line break.
    ///
    /// Returns false at end of stream.
    async fn read_line(&mut self) -> Result<bool> {
        self.line.clear();

        // Room for the content plus "\r\n"; anything longer cannot fit.
        let limit = self.max_size as u64 + 2;
        let n = AsyncReadExt::take(&mut self.reader, limit)
            .read_until(b'\n', &mut self.line)
            .await
            .map_err(|e| ReplayError::stream(format!("read failed: {e}")))?;

        if n == 0 {
            return Ok(false);
        }
        self.lines_read += 1;

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }

        if self.line.len() > self.max_size {
            return Err(ReplayError::config(format!(
                "line {} exceeds buffer size of {} bytes",
                self.lines_read, self.max_size
            )));
        }

        Ok(true)
    }
}
