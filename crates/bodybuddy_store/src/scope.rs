//! Write scopes: batches of pending writes committed atomically.

use crate::change_feed::ChangeType;
use crate::error::{StoreError, StoreResult};
use crate::row::{decode_row, encode_row, StoredRow};
use crate::store::Store;
use crate::types::{RowId, SequenceNumber};
use std::collections::HashMap;

/// A write buffered in a scope.
#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    Row {
        table: &'static str,
        row_id: RowId,
        remote_id: i64,
        payload: Vec<u8>,
        change: ChangeType,
    },
    Preference {
        key: String,
        value: Option<String>,
    },
}

/// A batch of writes against a [`Store`].
///
/// Nothing a scope does is visible to other readers until [`commit`]
/// returns; reads through the scope see its own pending writes first.
/// Dropping a scope without committing discards it.
///
/// [`commit`]: WriteScope::commit
pub struct WriteScope<'s> {
    store: &'s Store,
    writes: Vec<PendingWrite>,
    /// Latest pending image per (table, remote id), as an index into `writes`.
    staged: HashMap<(&'static str, i64), usize>,
}

impl<'s> WriteScope<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self {
            store,
            writes: Vec::new(),
            staged: HashMap::new(),
        }
    }

    /// Looks a row up by remote id, preferring this scope's pending image.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored row cannot be decoded.
    pub fn find_by_remote_id<T: StoredRow>(&self, remote_id: i64) -> StoreResult<Option<(RowId, T)>> {
        if let Some(&index) = self.staged.get(&(T::TABLE, remote_id)) {
            if let PendingWrite::Row { row_id, payload, .. } = &self.writes[index] {
                return Ok(Some((*row_id, decode_row(payload)?)));
            }
        }
        self.store.find_by_remote_id::<T>(remote_id)
    }

    /// Stages a new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateRemoteId`] if a row with the same remote
    /// id is already committed or staged.
    pub fn insert<T: StoredRow>(&mut self, row: &T) -> StoreResult<RowId> {
        let remote_id = row.remote_id();
        if self.staged.contains_key(&(T::TABLE, remote_id))
            || self.store.contains_remote_id(T::TABLE, remote_id)
        {
            return Err(StoreError::DuplicateRemoteId {
                table: T::TABLE.to_string(),
                remote_id,
            });
        }

        let row_id = self.store.allocate_row_id();
        self.stage(PendingWrite::Row {
            table: T::TABLE,
            row_id,
            remote_id,
            payload: encode_row(row)?,
            change: ChangeType::Insert,
        });
        Ok(row_id)
    }

    /// Stages a full replacement of an existing row's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowNotFound`] if `row_id` is neither committed nor
    /// staged in `T`'s table, or an invalid operation error if the row's remote
    /// id would change.
    pub fn update<T: StoredRow>(&mut self, row_id: RowId, row: &T) -> StoreResult<()> {
        let existing = self
            .staged_remote_id(T::TABLE, row_id)
            .or_else(|| self.store.remote_id_of(T::TABLE, row_id))
            .ok_or_else(|| StoreError::RowNotFound {
                table: T::TABLE.to_string(),
                row_id,
            })?;

        let remote_id = row.remote_id();
        if existing != remote_id {
            return Err(StoreError::invalid_operation(format!(
                "{row_id} in {} has remote id {existing}, not {remote_id}",
                T::TABLE
            )));
        }

        self.stage(PendingWrite::Row {
            table: T::TABLE,
            row_id,
            remote_id,
            payload: encode_row(row)?,
            change: ChangeType::Update,
        });
        Ok(())
    }

    /// Inserts the row, or replaces the one holding its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded or the lookup fails.
    pub fn upsert<T: StoredRow>(&mut self, row: &T) -> StoreResult<(RowId, ChangeType)> {
        match self.find_by_remote_id::<T>(row.remote_id())? {
            Some((row_id, _)) => {
                self.update(row_id, row)?;
                Ok((row_id, ChangeType::Update))
            }
            None => Ok((self.insert(row)?, ChangeType::Insert)),
        }
    }

    /// Stages a preference value; `None` removes the key.
    pub fn set_preference(&mut self, key: impl Into<String>, value: Option<String>) {
        self.writes.push(PendingWrite::Preference {
            key: key.into(),
            value,
        });
    }

    /// Number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Makes all staged writes durable and visible at once.
    ///
    /// An empty scope commits nothing and returns the current sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommitFailed`] if the journal cannot be written;
    /// none of the scope's writes are applied in that case.
    pub fn commit(self) -> StoreResult<SequenceNumber> {
        let store = self.store;
        store.commit_writes(self.writes)
    }

    /// Discards all staged writes.
    pub fn abort(self) {
        tracing::debug!(writes = self.writes.len(), "write scope aborted");
    }

    fn stage(&mut self, write: PendingWrite) {
        if let PendingWrite::Row {
            table, remote_id, ..
        } = &write
        {
            self.staged.insert((*table, *remote_id), self.writes.len());
        }
        self.writes.push(write);
    }

    fn staged_remote_id(&self, table: &str, wanted: RowId) -> Option<i64> {
        self.writes.iter().rev().find_map(|write| match write {
            PendingWrite::Row {
                table: t,
                row_id,
                remote_id,
                ..
            } if *t == table && *row_id == wanted => Some(*remote_id),
            _ => None,
        })
    }
}

impl std::fmt::Debug for WriteScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteScope")
            .field("writes", &self.writes.len())
            .finish_non_exhaustive()
    }
}
