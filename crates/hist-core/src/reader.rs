//! Logical entry reader.
//!
//! Physical lines ending in `\` continue onto the next line. The marker is
//! replaced by a newline so the joined entry keeps the command's original
//! line structure.

use std::io::{self, BufRead};

use crate::error::HistoryError;

const CONTINUATION: char = '\\';

/// Reads logical history entries from a line-oriented stream.
///
/// Every physical line is decoded as strict UTF-8. A reader created with
/// [`LineReader::capturing`] also records the raw bytes it consumes, which
/// can be replayed later through [`LineReader::into_replay`].
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    line: usize,
    buf: Vec<u8>,
    capture: Option<Vec<u8>>,
    finished: bool,
}

impl<R: BufRead> LineReader<R> {
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: Vec::new(),
            capture: None,
            finished: false,
        }
    }

    /// Creates a reader that mirrors every consumed byte into a replay buffer.
    pub const fn capturing(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: Vec::new(),
            capture: Some(Vec::new()),
            finished: false,
        }
    }

    /// Number of physical lines consumed so far.
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Returns the captured bytes, or `None` if this reader was not capturing.
    pub fn into_replay(self) -> Option<ReplayBuffer> {
        self.capture.map(|bytes| ReplayBuffer { bytes })
    }

    /// Reads the next logical entry.
    ///
    /// An empty physical line yields an empty entry. If the stream ends while
    /// an entry is still being continued, the partial entry is returned and
    /// the next call returns `None`.
    pub fn read_entry(&mut self) -> Result<Option<String>, HistoryError> {
        if self.finished {
            return Ok(None);
        }

        let mut entry = String::new();
        let mut consumed = false;
        loop {
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            };
            consumed = true;
            entry.push_str(&line);

            if entry.is_empty() {
                return Ok(Some(entry));
            }
            if entry.ends_with(CONTINUATION) {
                entry.pop();
                entry.push('\n');
                continue;
            }
            return Ok(Some(entry));
        }

        self.finished = true;
        Ok(consumed.then_some(entry))
    }

    /// Reads one physical line without its terminator.
    fn read_line(&mut self) -> Result<Option<String>, HistoryError> {
        self.buf.clear();
        let read = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| HistoryError::Read {
                line: self.line + 1,
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;

        if let Some(capture) = self.capture.as_mut() {
            capture.extend_from_slice(&self.buf);
        }

        let mut raw = self.buf.as_slice();
        if let Some(rest) = raw.strip_suffix(b"\n") {
            raw = rest;
        }
        if let Some(rest) = raw.strip_suffix(b"\r") {
            raw = rest;
        }

        let text = std::str::from_utf8(raw).map_err(|err| HistoryError::Read {
            line: self.line,
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;
        Ok(Some(text.to_owned()))
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<String, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}

/// Bytes captured by a [`LineReader`] during a first pass.
///
/// The buffer is append-only while capturing and read-only afterwards, so a
/// second pass never shares cursor state with the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayBuffer {
    bytes: Vec<u8>,
}

impl ReplayBuffer {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Creates a fresh reader over the captured content.
    pub fn reader(&self) -> LineReader<&[u8]> {
        LineReader::new(self.bytes.as_slice())
    }
}
