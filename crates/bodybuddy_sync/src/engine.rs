//! Sync entry point and state tracking.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetch::{FetchSummary, PageFetcher};
use crate::http::{HttpClient, ReqwestClient};
use crate::merge::{merge, MergeReport};
use crate::registry::EntityKind;
use bodybuddy_store::Store;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

const EVENT_CAPACITY: usize = 256;

/// Sync state of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Never synced in this process.
    Idle,
    /// Waiting for a page.
    Fetching,
    /// Merging a page into the store.
    Merging,
    /// The last sync completed.
    Synced,
    /// The last sync failed.
    Error,
}

impl SyncState {
    /// Returns true while a sync of the kind is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Fetching | SyncState::Merging)
    }
}

/// Statistics across all syncs of an engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Syncs that completed.
    pub syncs_completed: u64,
    /// Syncs that failed.
    pub syncs_failed: u64,
    /// Pages merged.
    pub pages_merged: u64,
    /// Records merged.
    pub records_merged: u64,
    /// When the last sync finished, successfully or not.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Kind that was synced.
    pub kind: EntityKind,
    /// Pages and records fetched.
    pub fetch: FetchSummary,
    /// Merge counts over all pages.
    pub merge: MergeReport,
    /// Wall time of the sync.
    pub duration: Duration,
}

/// Progress notifications published by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A sync began.
    Started {
        /// Kind being synced.
        kind: EntityKind,
    },
    /// One page was merged and committed.
    PageMerged {
        /// Kind being synced.
        kind: EntityKind,
        /// Zero-based page index.
        page: usize,
        /// What the merge did.
        report: MergeReport,
    },
    /// A sync completed.
    Completed {
        /// Kind that was synced.
        kind: EntityKind,
        /// Totals of the sync.
        report: SyncReport,
    },
    /// A sync stopped with an error. Pages merged before it stay committed.
    Failed {
        /// Kind that was synced.
        kind: EntityKind,
        /// Error message.
        error: String,
    },
}

/// Mirrors remote catalog collections into a [`Store`].
///
/// Syncs of different kinds run concurrently; syncs of the same kind queue
/// behind each other. That queue belongs to one engine: two engines sharing
/// a store can still race on a remote id. The store then keeps one row, but
/// the later commit replaces the whole row image, so attributes the losing
/// record did not carry are cleared until the next sync.
pub struct SyncEngine<C: HttpClient> {
    store: Arc<Store>,
    fetcher: PageFetcher<C>,
    /// One lock per kind, indexed by `EntityKind as usize`.
    locks: [Mutex<()>; 4],
    states: RwLock<[SyncState; 4]>,
    stats: RwLock<SyncStats>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine<ReqwestClient> {
    /// Creates an engine talking to the network through `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Request`] if the HTTP client cannot be built.
    pub fn connect(store: Arc<Store>, config: SyncConfig) -> SyncResult<Self> {
        let client = ReqwestClient::new(&config).map_err(SyncError::Request)?;
        Ok(Self::new(store, config, client))
    }
}

impl<C: HttpClient> SyncEngine<C> {
    /// Creates an engine over any HTTP client.
    pub fn new(store: Arc<Store>, config: SyncConfig, client: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            fetcher: PageFetcher::new(config, client),
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(()), Mutex::new(())],
            states: RwLock::new([SyncState::Idle; 4]),
            stats: RwLock::new(SyncStats::default()),
            events,
        }
    }

    /// The store rows are merged into.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The page fetcher.
    pub fn fetcher(&self) -> &PageFetcher<C> {
        &self.fetcher
    }

    /// Current state of `kind`.
    pub fn state(&self, kind: EntityKind) -> SyncState {
        self.states.read()[kind as usize]
    }

    /// Statistics so far.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Subscribes to progress events.
    ///
    /// A slow receiver that falls more than a few hundred events behind
    /// observes `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Fetches every page of `kind` and merges each into the store.
    ///
    /// Waits for a running sync of the same kind to finish first.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, decode or merge error. Pages merged before
    /// the error stay committed; no page after it is requested.
    pub async fn sync(&self, kind: EntityKind) -> SyncResult<SyncReport> {
        let _guard = self.locks[kind as usize].lock().await;
        let start = Instant::now();

        self.set_state(kind, SyncState::Fetching);
        info!(kind = %kind, "sync started");
        self.publish(SyncEvent::Started { kind });

        let mut merged = MergeReport::default();
        let result = self
            .fetcher
            .fetch_all(kind, |page| {
                self.set_state(kind, SyncState::Merging);
                let report = run_blocking(|| merge(&self.store, kind, &page.records))?;
                merged.absorb(&report);
                {
                    let mut stats = self.stats.write();
                    stats.pages_merged += 1;
                    stats.records_merged += page.records.len() as u64;
                }
                self.publish(SyncEvent::PageMerged {
                    kind,
                    page: page.index,
                    report,
                });
                self.set_state(kind, SyncState::Fetching);
                Ok(())
            })
            .await;

        match result {
            Ok(fetch) => {
                let report = SyncReport {
                    kind,
                    fetch,
                    merge: merged,
                    duration: start.elapsed(),
                };
                self.set_state(kind, SyncState::Synced);
                {
                    let mut stats = self.stats.write();
                    stats.syncs_completed += 1;
                    stats.last_sync_time = Some(Instant::now());
                }
                info!(
                    kind = %kind,
                    pages = fetch.pages,
                    records = fetch.records,
                    inserted = report.merge.inserted,
                    updated = report.merge.updated,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync finished"
                );
                self.publish(SyncEvent::Completed {
                    kind,
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(err) => {
                self.set_state(kind, SyncState::Error);
                {
                    let mut stats = self.stats.write();
                    stats.syncs_failed += 1;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = Some(err.to_string());
                }
                error!(kind = %kind, error = %err, "sync failed");
                self.publish(SyncEvent::Failed {
                    kind,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Starts a sync of `kind` on the runtime and returns at once.
    ///
    /// The outcome is logged and published as an event; the handle can be
    /// awaited for it as well.
    pub fn spawn_sync(self: &Arc<Self>, kind: EntityKind) -> JoinHandle<SyncResult<SyncReport>>
    where
        C: 'static,
    {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.sync(kind).await })
    }

    fn set_state(&self, kind: EntityKind, state: SyncState) {
        self.states.write()[kind as usize] = state;
    }

    fn publish(&self, event: SyncEvent) {
        // No receivers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Runs journal-bound work off the async scheduler's hot path.
///
/// On a multi-threaded runtime the worker hands its other tasks away while
/// `f` blocks; elsewhere `f` simply runs in place.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl<C: HttpClient> std::fmt::Debug for SyncEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("fetcher", &self.fetcher)
            .field("states", &*self.states.read())
            .finish_non_exhaustive()
    }
}
