//! NUL-delimited record splitting for `git status -z` output.
//!
//! [`RecordSplitter`] is a pure reducer over stdout chunks: every call to
//! [`RecordSplitter::feed`] returns the records completed by that chunk and
//! keeps the incomplete tail for the next one. Splitting happens on bytes and
//! each record is decoded only once it is complete, so a multi-byte UTF-8
//! sequence cut by a chunk boundary is reassembled intact.

/// Record delimiter used by `-z` porcelain output
pub const RECORD_DELIMITER: u8 = b'\0';

/// Incremental NUL splitter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSplitter {
    remainder: Vec<u8>,
}

impl RecordSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed, in order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.remainder.extend_from_slice(chunk);

        let Some(last) = self.remainder.iter().rposition(|b| *b == RECORD_DELIMITER) else {
            return Vec::new();
        };

        let tail = self.remainder.split_off(last + 1);
        let complete = std::mem::replace(&mut self.remainder, tail);

        complete[..last]
            .split(|b| *b == RECORD_DELIMITER)
            .map(|record| String::from_utf8_lossy(record).into_owned())
            .collect()
    }

    /// Functional form of [`feed`](Self::feed): `(state, chunk) -> (state, records)`
    pub fn step(mut self, chunk: &[u8]) -> (Self, Vec<String>) {
        let records = self.feed(chunk);
        (self, records)
    }

    /// Bytes buffered for the current incomplete record
    pub fn pending_bytes(&self) -> usize {
        self.remainder.len()
    }

    /// End of stream. Returns the unterminated leftover, if any, which callers discard.
    pub fn finish(self) -> Option<String> {
        if self.remainder.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.remainder).into_owned())
        }
    }
}
