//! Core identifiers used by the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity of a local row.
///
/// Row ids are allocated by the store, never reused within a process, and
/// stable across restarts once committed. They are distinct from the remote
/// `id` attribute a row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl RowId {
    /// Creates a new row id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}", self.0)
    }
}

/// Sequence number of a committed batch.
///
/// Every non-empty commit gets the next sequence number; change events carry
/// the sequence of the commit that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_id_ordering() {
        assert!(RowId::new(1) < RowId::new(2));
        assert_eq!(format!("{}", RowId::new(42)), "row:42");
    }

    #[test]
    fn sequence_number_next() {
        let s = SequenceNumber::new(5);
        assert_eq!(s.next().as_u64(), 6);
        assert_eq!(SequenceNumber::default(), SequenceNumber::new(0));
    }
}
