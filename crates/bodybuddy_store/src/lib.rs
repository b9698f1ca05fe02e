//! # BodyBuddy Store
//!
//! Persisted local store for BodyBuddy's catalog and preferences.
//!
//! This crate provides:
//! - One table per row type, with a unique index on each row's remote id
//! - Atomic write scopes that read their own pending writes
//! - An append-only journal with checksummed frames and torn-tail recovery
//! - A change feed and live queries for observers
//! - A process lock so only one process writes the store file
//!
//! ## Key Invariants
//!
//! - A commit is visible to readers only after its frame is durable
//! - At most one row per (table, remote id)
//! - Row ids are never reused and survive restarts
//! - Observers see commits in sequence order, never partial ones

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod error;
mod journal;
mod lock;
mod preferences;
mod query;
mod row;
mod scope;
mod state;
mod store;
mod types;

pub mod storage;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use journal::{JOURNAL_MAGIC, JOURNAL_VERSION};
pub use preferences::{Preferences, LANGUAGE_KEY};
pub use query::{ListChange, LiveQuery, Query};
pub use row::{decode_row, StoredRow};
pub use scope::WriteScope;
pub use store::{Store, StoreStats};
pub use types::{RowId, SequenceNumber};
