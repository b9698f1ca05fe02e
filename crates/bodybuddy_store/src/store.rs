//! Store facade and recovery.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeType};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::journal::{CommitRecord, Journal, JournalWrite};
use crate::lock::StoreLock;
use crate::row::{decode_row, StoredRow};
use crate::scope::{PendingWrite, WriteScope};
use crate::state::State;
use crate::storage::{FileBackend, InMemoryBackend, StorageBackend};
use crate::types::{RowId, SequenceNumber};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;

/// The persisted, table-per-entity store.
///
/// `Store` keeps every committed row in memory and appends each commit to a
/// journal before making it visible. Writes go through a [`WriteScope`];
/// commits are serialized, reads never block on the journal.
///
/// # Opening a store
///
/// ```rust,ignore
/// use bodybuddy_store::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("data/database.bbj"))?;
///
/// store.transaction(|scope| {
///     scope.upsert(&unit)?;
///     Ok(())
/// })?;
///
/// store.close()?;
/// ```
///
/// For tests, [`Store::open_in_memory`] gives a store with no file.
pub struct Store {
    config: Config,
    path: Option<PathBuf>,
    /// Held while open. None for stores without a file.
    lock: Mutex<Option<StoreLock>>,
    /// Commits hold this for their whole duration.
    journal: Mutex<Journal>,
    state: RwLock<State>,
    feed: ChangeFeed,
    next_row_id: AtomicU64,
    is_open: AtomicBool,
}

impl Store {
    /// Opens or creates the store file at `path` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the store,
    /// [`StoreError::JournalCorruption`] if a complete frame cannot be replayed,
    /// or an I/O error.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the store file at `path` with custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`]; additionally fails with an invalid operation
    /// error if the file is missing and `create_if_missing` is off.
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        if !config.create_if_missing && !path.exists() {
            return Err(StoreError::invalid_operation(format!(
                "store file {} does not exist",
                path.display()
            )));
        }

        let lock = StoreLock::acquire(path)?;
        let backend = FileBackend::open(path)?;
        let mut store = Self::open_with_backend(config, Box::new(backend))?;
        store.path = Some(path.to_path_buf());
        *store.lock.get_mut() = Some(lock);

        tracing::info!(
            path = %path.display(),
            sequence = %store.committed_seq(),
            "store opened"
        );
        Ok(store)
    }

    /// Opens a store over an arbitrary backend, replaying its journal.
    ///
    /// No lock file is taken; the caller owns exclusivity of the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if replay fails.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let mut journal = Journal::new(backend, &config);
        let mut state = State::default();
        for record in journal.recover()? {
            state.apply(record);
        }

        Ok(Self {
            config,
            path: None,
            lock: Mutex::new(None),
            journal: Mutex::new(journal),
            next_row_id: AtomicU64::new(state.max_row_id() + 1),
            state: RwLock::new(state),
            feed: ChangeFeed::new(),
            is_open: AtomicBool::new(true),
        })
    }

    /// Opens an empty store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other constructors.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// Starts a write scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Store::close`].
    pub fn begin(&self) -> StoreResult<WriteScope<'_>> {
        self.ensure_open()?;
        Ok(WriteScope::new(self))
    }

    /// Runs `f` in a fresh scope and commits it if `f` succeeds.
    ///
    /// The error type only needs a conversion from [`StoreError`], so callers
    /// can use their own error enums inside the closure.
    ///
    /// # Errors
    ///
    /// Returns the closure's error (nothing is committed) or a commit error.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<(T, SequenceNumber), E>
    where
        F: FnOnce(&mut WriteScope<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut scope = self.begin()?;
        match f(&mut scope) {
            Ok(value) => {
                let sequence = scope.commit()?;
                Ok((value, sequence))
            }
            Err(err) => {
                scope.abort();
                Err(err)
            }
        }
    }

    /// Gets a committed row by local identity.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the row cannot be decoded as `T`.
    pub fn get<T: StoredRow>(&self, row_id: RowId) -> StoreResult<Option<T>> {
        let state = self.state.read();
        state
            .table(T::TABLE)
            .and_then(|table| table.get(row_id))
            .map(|image| decode_row(&image.payload))
            .transpose()
    }

    /// Gets the committed row holding `remote_id`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the row cannot be decoded as `T`.
    pub fn find_by_remote_id<T: StoredRow>(&self, remote_id: i64) -> StoreResult<Option<(RowId, T)>> {
        let state = self.state.read();
        let Some(table) = state.table(T::TABLE) else {
            return Ok(None);
        };
        match table.row_for_remote(remote_id) {
            Some(row_id) => match table.get(row_id) {
                Some(image) => Ok(Some((row_id, decode_row(&image.payload)?))),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// All committed rows of `T`'s table, in row id order.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a row cannot be decoded as `T`.
    pub fn rows<T: StoredRow>(&self) -> StoreResult<Vec<(RowId, T)>> {
        Ok(self.snapshot::<T>()?.0)
    }

    /// Committed rows of `T`'s table matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a row cannot be decoded as `T`.
    pub fn find_where<T, P>(&self, predicate: P) -> StoreResult<Vec<(RowId, T)>>
    where
        T: StoredRow,
        P: Fn(&T) -> bool,
    {
        let mut rows = self.rows::<T>()?;
        rows.retain(|(_, row)| predicate(row));
        Ok(rows)
    }

    /// Rows of `T`'s table together with the sequence they reflect.
    pub(crate) fn snapshot<T: StoredRow>(&self) -> StoreResult<(Vec<(RowId, T)>, SequenceNumber)> {
        let state = self.state.read();
        let rows = match state.table(T::TABLE) {
            Some(table) => table
                .iter()
                .map(|(row_id, image)| Ok((row_id, decode_row(&image.payload)?)))
                .collect::<StoreResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok((rows, state.committed()))
    }

    /// Number of committed rows in `table`.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.state.read().table(table).map_or(0, |t| t.len())
    }

    /// Names of all tables holding at least one row.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.state.read().table_names()
    }

    /// Reads a committed preference.
    #[must_use]
    pub fn preference(&self, key: &str) -> Option<String> {
        self.state.read().preference(key).map(str::to_string)
    }

    /// Commits a single preference value; `None` removes the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub fn set_preference(&self, key: &str, value: Option<&str>) -> StoreResult<SequenceNumber> {
        let mut scope = self.begin()?;
        scope.set_preference(key, value.map(str::to_string));
        scope.commit()
    }

    /// Subscribes to committed row changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Sequence of the last durable commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.state.read().committed()
    }

    /// Path of the store file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Point-in-time statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal size cannot be read.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let journal = self.journal.lock();
        let state = self.state.read();
        let tables = state
            .table_names()
            .into_iter()
            .map(|name| {
                let rows = state.table(&name).map_or(0, |t| t.len());
                (name, rows)
            })
            .collect();

        Ok(StoreStats {
            journal_bytes: journal.size()?,
            commits: journal.frames(),
            committed_seq: state.committed(),
            tables,
            preferences: state.preferences().clone(),
        })
    }

    /// Flushes the journal and releases the lock file.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        if !self.is_open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        journal.sync()?;
        self.lock.lock().take();
        tracing::debug!("store closed");
        Ok(())
    }

    /// Returns true until [`Store::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    pub(crate) fn allocate_row_id(&self) -> RowId {
        RowId::new(self.next_row_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn contains_remote_id(&self, table: &str, remote_id: i64) -> bool {
        self.state.read().row_for_remote(table, remote_id).is_some()
    }

    pub(crate) fn remote_id_of(&self, table: &str, row_id: RowId) -> Option<i64> {
        self.state
            .read()
            .table(table)
            .and_then(|t| t.get(row_id))
            .map(|image| image.remote_id)
    }

    /// Journals and applies a scope's writes as one commit.
    ///
    /// Inserts whose remote id was committed by someone else since they were
    /// staged become updates of the committed row, so the unique index holds
    /// even when two scopes raced on the same remote id. The staged image
    /// replaces the committed one whole; attributes are not merged.
    pub(crate) fn commit_writes(&self, writes: Vec<PendingWrite>) -> StoreResult<SequenceNumber> {
        self.ensure_open()?;
        let mut journal = self.journal.lock();
        self.ensure_open()?;

        if writes.is_empty() {
            return Ok(self.committed_seq());
        }

        let (record, events) = {
            let state = self.state.read();
            resolve(&state, writes, state.committed().next())
        };
        let sequence = record.sequence;

        journal
            .append(&record)
            .map_err(|e| StoreError::commit_failed(e.to_string()))?;
        self.state.write().apply(record);

        tracing::debug!(%sequence, rows = events.len(), "commit applied");
        self.feed.emit_batch(events);
        Ok(sequence)
    }
}

fn resolve(
    state: &State,
    writes: Vec<PendingWrite>,
    sequence: SequenceNumber,
) -> (CommitRecord, Vec<ChangeEvent>) {
    let mut remapped: HashMap<(&'static str, RowId), RowId> = HashMap::new();
    let mut journal_writes = Vec::with_capacity(writes.len());
    let mut events = Vec::new();

    for write in writes {
        match write {
            PendingWrite::Row {
                table,
                row_id,
                remote_id,
                payload,
                change,
            } => {
                let (row_id, change) = match change {
                    ChangeType::Insert => match state.row_for_remote(table, remote_id) {
                        Some(existing) => {
                            tracing::debug!(
                                table,
                                remote_id,
                                "remote id committed concurrently, insert becomes update"
                            );
                            remapped.insert((table, row_id), existing);
                            (existing, ChangeType::Update)
                        }
                        None => (row_id, ChangeType::Insert),
                    },
                    ChangeType::Update => (
                        remapped.get(&(table, row_id)).copied().unwrap_or(row_id),
                        ChangeType::Update,
                    ),
                };

                events.push(ChangeEvent {
                    sequence,
                    table: table.to_string(),
                    row_id,
                    remote_id,
                    change_type: change,
                    payload: payload.clone(),
                });
                journal_writes.push(JournalWrite::Row {
                    table: table.to_string(),
                    row_id,
                    remote_id,
                    payload,
                });
            }
            PendingWrite::Preference { key, value } => {
                journal_writes.push(JournalWrite::Preference { key, value });
            }
        }
    }

    (
        CommitRecord {
            sequence,
            writes: journal_writes,
        },
        events,
    )
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("committed_seq", &self.committed_seq())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Size of the journal in bytes.
    pub journal_bytes: u64,
    /// Number of commit frames in the journal.
    pub commits: u64,
    /// Sequence of the last commit.
    pub committed_seq: SequenceNumber,
    /// Row count per table.
    pub tables: BTreeMap<String, usize>,
    /// All stored preferences.
    pub preferences: BTreeMap<String, String>,
}
