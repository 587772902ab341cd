//! Line codec for the ASCII command protocol.
//!
//! Wire format, both directions:
//! ```text
//! ┌──────────────────────────┬────┐
//! │ ASCII payload            │ \n │      "R 0\n"  →  "512\r\n"
//! └──────────────────────────┴────┘      "ON 30\n" →  "OK\r\n"
//! ```
//!
//! The reader accumulates incoming bytes and yields complete lines.  This
//! handles partial reads: a single `SerialLink::read` may return
//! part of a line or several lines concatenated.  Reading is polled: when no
//! bytes are waiting the reader sleeps for the poll interval, and gives up at
//! the deadline.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use super::transport::SerialLink;

/// Maximum line length (protects against a babbling device).
pub const MAX_LINE: usize = 64;

/// Bytes pulled from the link per read.
const CHUNK: usize = 32;

#[derive(Debug)]
pub enum LineError {
    /// The link failed while reading.
    Io(io::Error),
    /// No complete line before the deadline.
    Timeout,
    /// More than [`MAX_LINE`] bytes without a terminator.
    Overflow,
}

impl From<io::Error> for LineError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl core::fmt::Display for LineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "link I/O error: {}", e),
            Self::Timeout => write!(f, "timed out waiting for a line"),
            Self::Overflow => write!(f, "line exceeds {} bytes", MAX_LINE),
        }
    }
}

/// Streaming line reader.
pub struct LineReader {
    buf: heapless::Vec<u8, MAX_LINE>,
    poll_interval: Duration,
}

impl LineReader {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            buf: heapless::Vec::new(),
            poll_interval,
        }
    }

    /// Next line (trimmed, possibly empty) received before `deadline`.
    pub fn next_line(
        &mut self,
        link: &mut dyn SerialLink,
        deadline: Instant,
    ) -> Result<String, LineError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LineError::Timeout);
            }

            let waiting = link.available()?;
            if waiting > 0 {
                let mut chunk = [0u8; CHUNK];
                let n = link.read(&mut chunk[..waiting.min(CHUNK)])?;
                self.feed(&chunk[..n])?;
                if n > 0 {
                    continue;
                }
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Next non-empty line, skipping blank keep-alive lines.
    pub fn next_non_empty_line(
        &mut self,
        link: &mut dyn SerialLink,
        deadline: Instant,
    ) -> Result<String, LineError> {
        loop {
            let line = self.next_line(link, deadline)?;
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn feed(&mut self, data: &[u8]) -> Result<(), LineError> {
        self.buf
            .extend_from_slice(data)
            .map_err(|()| LineError::Overflow)
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buf[..end]).trim().to_owned();

        // Keep whatever followed the terminator for the next call.
        let rest: heapless::Vec<u8, MAX_LINE> =
            heapless::Vec::from_slice(&self.buf[end + 1..]).unwrap_or_default();
        self.buf = rest;
        Some(line)
    }
}
