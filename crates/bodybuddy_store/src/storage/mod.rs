//! Byte-level storage backends for the journal.
//!
//! Backends are opaque, append-only byte stores. They know nothing about
//! frames, rows or tables; the journal owns all interpretation.
//!
//! - [`InMemoryBackend`] for tests and ephemeral stores
//! - [`FileBackend`] for the persisted store file

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use crate::error::StoreResult;

/// An append-only byte store backing the journal.
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_at` returns exactly the bytes previously written at that offset
/// - after `sync` returns, appended data survives process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ReadPastEnd`] if the range extends beyond
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Makes all appended data durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be synced.
    fn sync(&mut self) -> StoreResult<()>;

    /// Returns the current size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StoreResult<u64>;

    /// Drops everything after `new_size`. Used to cut a torn journal tail.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` exceeds the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;
}

/// Reads the whole backend into memory.
pub(crate) fn read_all(backend: &dyn StorageBackend) -> StoreResult<Vec<u8>> {
    let size = backend.size()?;
    let len = usize::try_from(size)
        .map_err(|_| crate::StoreError::invalid_operation("store file too large to load"))?;
    backend.read_at(0, len)
}
