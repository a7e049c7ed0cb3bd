//! A small byte-collection type used to carry segment text and option
//! payloads around the core without committing callers to `Vec<u8>`
//! directly.
//!
//! This is a simplified cousin of `elvis_core::message::Message`: the same
//! `concatenate`/`slice`/`cut`/`remove_front` vocabulary, backed by a single
//! contiguous buffer rather than a deque of zero-copy chunks, since the
//! MPTCP core moves segment text between queues far less often than a
//! full network simulator moves packets between protocol layers.

use std::fmt::Display;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    bytes: Vec<u8>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { bytes: body.into() }
    }

    /// Prepends `header` to the message.
    pub fn header(&mut self, header: impl Into<Vec<u8>>) {
        let mut header = header.into();
        header.extend_from_slice(&self.bytes);
        self.bytes = header;
    }

    /// Adds `other` to the end of this message.
    pub fn concatenate(&mut self, other: Message) {
        self.bytes.extend(other.bytes);
    }

    /// Restricts the message to the given byte range.
    pub fn slice(&mut self, range: impl std::ops::RangeBounds<usize>) {
        use std::ops::Bound;
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.bytes.len(),
        };
        self.bytes = self.bytes[start..end].to_vec();
    }

    /// Removes the first `len` bytes and returns them as a new message.
    pub fn cut(&mut self, len: usize) -> Self {
        assert!(len <= self.bytes.len());
        let rest = self.bytes.split_off(len);
        let cut = std::mem::replace(&mut self.bytes, rest);
        Self { bytes: cut }
    }

    pub fn remove_front(&mut self, len: usize) {
        assert!(len <= self.bytes.len());
        self.bytes.drain(0..len);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.bytes.iter()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} byte message", self.bytes.len())
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}
