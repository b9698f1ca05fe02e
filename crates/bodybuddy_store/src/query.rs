//! Filtered, sorted reads and live result lists.

use crate::change_feed::ChangeEvent;
use crate::error::StoreResult;
use crate::row::StoredRow;
use crate::store::Store;
use crate::types::{RowId, SequenceNumber};
use std::cmp::Ordering;
use std::fmt;
use std::sync::mpsc::Receiver;

type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Sort<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A query over one table.
///
/// Rows that compare equal under the sort keep row id order.
pub struct Query<T> {
    filter: Option<Filter<T>>,
    sort: Option<Sort<T>>,
}

impl<T: StoredRow> Query<T> {
    /// Every row, in row id order.
    #[must_use]
    pub fn all() -> Self {
        Self {
            filter: None,
            sort: None,
        }
    }

    /// Keeps only rows for which `f` returns true.
    #[must_use]
    pub fn filter(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Orders rows with a comparator.
    #[must_use]
    pub fn sort_by(mut self, f: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        self.sort = Some(Box::new(f));
        self
    }

    /// Orders rows by a key.
    #[must_use]
    pub fn sort_by_key<K: Ord>(self, f: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        self.sort_by(move |a, b| f(a).cmp(&f(b)))
    }

    fn matches(&self, row: &T) -> bool {
        self.filter.as_ref().map_or(true, |f| f(row))
    }

    fn compare(&self, a: (RowId, &T), b: (RowId, &T)) -> Ordering {
        self.sort
            .as_ref()
            .map_or(Ordering::Equal, |f| f(a.1, b.1))
            .then(a.0.cmp(&b.0))
    }

    fn apply(&self, mut rows: Vec<(RowId, T)>) -> Vec<(RowId, T)> {
        rows.retain(|(_, row)| self.matches(row));
        rows.sort_by(|a, b| self.compare((a.0, &a.1), (b.0, &b.1)));
        rows
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filtered", &self.filter.is_some())
            .field("sorted", &self.sort.is_some())
            .finish()
    }
}

/// Change to a live result list, in terms of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// A row appeared at `index`.
    Inserted {
        /// Position of the new row.
        index: usize,
    },
    /// The row at `index` changed without moving.
    Updated {
        /// Position of the row.
        index: usize,
    },
    /// The row at `index` stopped matching and was removed.
    Deleted {
        /// Former position of the row.
        index: usize,
    },
    /// A row moved after its attributes changed.
    Moved {
        /// Old position.
        from: usize,
        /// New position.
        to: usize,
    },
}

/// A query result kept current by the store's change feed.
///
/// The feed is subscribed before the initial snapshot is read, and events
/// already reflected in the snapshot are skipped, so no commit is missed
/// or applied twice.
pub struct LiveQuery<T> {
    query: Query<T>,
    rows: Vec<(RowId, T)>,
    snapshot_seq: SequenceNumber,
    events: Receiver<ChangeEvent>,
}

impl<T: StoredRow> LiveQuery<T> {
    /// Current rows in query order.
    #[must_use]
    pub fn rows(&self) -> &[(RowId, T)] {
        &self.rows
    }

    /// Number of rows in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no row matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies every event received so far and reports the list changes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if an event payload cannot be decoded.
    pub fn poll(&mut self) -> StoreResult<Vec<ListChange>> {
        let pending: Vec<ChangeEvent> = self.events.try_iter().collect();
        let mut changes = Vec::new();
        for event in &pending {
            changes.extend(self.apply(event)?);
        }
        Ok(changes)
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the payload cannot be decoded.
    pub fn apply(&mut self, event: &ChangeEvent) -> StoreResult<Vec<ListChange>> {
        if !event.is_for::<T>() || event.sequence <= self.snapshot_seq {
            return Ok(Vec::new());
        }

        let row: T = event.decode()?;
        let old = self.rows.iter().position(|(id, _)| *id == event.row_id);
        if let Some(index) = old {
            self.rows.remove(index);
        }

        if !self.query.matches(&row) {
            return Ok(old.map(|index| ListChange::Deleted { index }).into_iter().collect());
        }

        let new = self
            .rows
            .partition_point(|(id, r)| self.query.compare((*id, r), (event.row_id, &row)) == Ordering::Less);
        self.rows.insert(new, (event.row_id, row));

        Ok(match old {
            None => vec![ListChange::Inserted { index: new }],
            Some(index) if index == new => vec![ListChange::Updated { index }],
            Some(from) => vec![
                ListChange::Moved { from, to: new },
                ListChange::Updated { index: new },
            ],
        })
    }
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("query", &self.query)
            .field("rows", &self.rows.len())
            .field("snapshot_seq", &self.snapshot_seq)
            .finish()
    }
}

impl Store {
    /// Runs a query against committed rows.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a row cannot be decoded as `T`.
    pub fn query<T: StoredRow>(&self, query: &Query<T>) -> StoreResult<Vec<(RowId, T)>> {
        let (rows, _) = self.snapshot::<T>()?;
        Ok(query.apply(rows))
    }

    /// Runs a query and keeps its result current as commits land.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a row cannot be decoded as `T`.
    pub fn live_query<T: StoredRow>(&self, query: Query<T>) -> StoreResult<LiveQuery<T>> {
        let events = self.subscribe();
        let (rows, snapshot_seq) = self.snapshot::<T>()?;
        let rows = query.apply(rows);
        Ok(LiveQuery {
            query,
            rows,
            snapshot_seq,
            events,
        })
    }
}
