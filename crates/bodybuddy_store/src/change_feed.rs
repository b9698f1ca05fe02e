//! Change notification for committed row writes.
//!
//! The store emits one [`ChangeEvent`] per row write after the commit that
//! produced it is durable. Events of one commit share a sequence number and
//! arrive in write order; commits arrive in sequence order.
//!
//! ```rust,ignore
//! let store = Store::open_in_memory()?;
//! let rx = store.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = rx.recv() {
//!         println!("{} {:?} {}", event.table, event.change_type, event.row_id);
//!     }
//! });
//! ```

use crate::error::StoreResult;
use crate::row::{decode_row, StoredRow};
use crate::types::{RowId, SequenceNumber};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// The row did not exist before the commit.
    Insert,
    /// The row existed and its attributes were replaced.
    Update,
}

/// A committed row write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Sequence of the commit.
    pub sequence: SequenceNumber,
    /// Table the row lives in.
    pub table: String,
    /// Local identity of the row.
    pub row_id: RowId,
    /// Remote identifier of the row.
    pub remote_id: i64,
    /// Insert or update.
    pub change_type: ChangeType,
    /// Encoded row image after the write.
    pub payload: Vec<u8>,
}

impl ChangeEvent {
    /// Returns true if the event belongs to `T`'s table.
    #[must_use]
    pub fn is_for<T: StoredRow>(&self) -> bool {
        self.table == T::TABLE
    }

    /// Decodes the row image carried by the event.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the payload is not a `T`.
    pub fn decode<T: StoredRow>(&self) -> StoreResult<T> {
        decode_row(&self.payload)
    }
}

/// Fans committed events out to subscribers.
///
/// Disconnected subscribers are dropped on the next emit. The feed keeps no
/// history; a subscriber sees only events committed after it subscribed.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    /// Creates a feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for all future events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends an event to every live subscriber.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Sends the events of one commit in order.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Number of connected subscribers as of the last emit.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
