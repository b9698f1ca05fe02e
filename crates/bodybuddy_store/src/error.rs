//! Error types for the local store.

use std::io;
use thiserror::Error;

use crate::types::RowId;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the backing storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A row or journal payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The journal contains a frame that cannot be replayed.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A commit could not be applied and its writes were discarded.
    #[error("commit failed: {reason}")]
    CommitFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// A row was addressed that does not exist.
    #[error("row {row_id} not found in table {table}")]
    RowNotFound {
        /// Table name.
        table: String,
        /// Row identity.
        row_id: RowId,
    },

    /// A row with the same remote id already exists in the table.
    #[error("duplicate remote id {remote_id} in table {table}")]
    DuplicateRemoteId {
        /// Table name.
        table: String,
        /// The remote identifier.
        remote_id: i64,
    },

    /// Another process holds the store's lock file.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl std::fmt::Display) -> Self {
        Self::Codec(message.to_string())
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates a commit failure error.
    pub fn commit_failed(reason: impl Into<String>) -> Self {
        Self::CommitFailed {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
