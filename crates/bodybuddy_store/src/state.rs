//! Committed in-memory state rebuilt from the journal.

use crate::journal::{CommitRecord, JournalWrite};
use crate::types::{RowId, SequenceNumber};
use std::collections::{BTreeMap, HashMap};

/// Committed rows of one table with a unique index on the remote id.
#[derive(Debug, Default)]
pub(crate) struct Table {
    rows: BTreeMap<RowId, StoredImage>,
    by_remote: HashMap<i64, RowId>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredImage {
    pub remote_id: i64,
    pub payload: Vec<u8>,
}

impl Table {
    pub(crate) fn get(&self, row_id: RowId) -> Option<&StoredImage> {
        self.rows.get(&row_id)
    }

    pub(crate) fn row_for_remote(&self, remote_id: i64) -> Option<RowId> {
        self.by_remote.get(&remote_id).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (RowId, &StoredImage)> {
        self.rows.iter().map(|(id, image)| (*id, image))
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    fn put(&mut self, row_id: RowId, remote_id: i64, payload: Vec<u8>) {
        if let Some(previous) = self.rows.get(&row_id) {
            if previous.remote_id != remote_id {
                self.by_remote.remove(&previous.remote_id);
            }
        }
        self.by_remote.insert(remote_id, row_id);
        self.rows.insert(row_id, StoredImage { remote_id, payload });
    }
}

/// Everything the store has committed.
#[derive(Debug, Default)]
pub(crate) struct State {
    tables: HashMap<String, Table>,
    preferences: BTreeMap<String, String>,
    committed: SequenceNumber,
    max_row_id: u64,
}

impl State {
    pub(crate) fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub(crate) fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn row_for_remote(&self, table: &str, remote_id: i64) -> Option<RowId> {
        self.tables.get(table)?.row_for_remote(remote_id)
    }

    pub(crate) fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    pub(crate) fn preferences(&self) -> &BTreeMap<String, String> {
        &self.preferences
    }

    pub(crate) fn committed(&self) -> SequenceNumber {
        self.committed
    }

    /// Highest row id seen in any committed frame.
    pub(crate) fn max_row_id(&self) -> u64 {
        self.max_row_id
    }

    /// Applies a durable commit.
    pub(crate) fn apply(&mut self, record: CommitRecord) {
        for write in record.writes {
            match write {
                JournalWrite::Row {
                    table,
                    row_id,
                    remote_id,
                    payload,
                } => {
                    self.max_row_id = self.max_row_id.max(row_id.as_u64());
                    self.tables
                        .entry(table)
                        .or_default()
                        .put(row_id, remote_id, payload);
                }
                JournalWrite::Preference { key, value: Some(value) } => {
                    self.preferences.insert(key, value);
                }
                JournalWrite::Preference { key, value: None } => {
                    self.preferences.remove(&key);
                }
            }
        }
        self.committed = self.committed.max(record.sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(table: &str, row_id: u64, remote_id: i64, payload: u8) -> JournalWrite {
        JournalWrite::Row {
            table: table.into(),
            row_id: RowId::new(row_id),
            remote_id,
            payload: vec![payload],
        }
    }

    #[test]
    fn apply_indexes_remote_ids() {
        let mut state = State::default();
        state.apply(CommitRecord {
            sequence: SequenceNumber::new(1),
            writes: vec![row("Exercise", 1, 100, 1), row("Exercise", 2, 200, 2)],
        });

        assert_eq!(state.row_for_remote("Exercise", 200), Some(RowId::new(2)));
        assert_eq!(state.row_for_remote("Language", 200), None);
        assert_eq!(state.committed(), SequenceNumber::new(1));
        assert_eq!(state.max_row_id(), 2);
    }

    #[test]
    fn later_image_replaces_earlier() {
        let mut state = State::default();
        state.apply(CommitRecord {
            sequence: SequenceNumber::new(1),
            writes: vec![row("Exercise", 1, 100, 1)],
        });
        state.apply(CommitRecord {
            sequence: SequenceNumber::new(2),
            writes: vec![row("Exercise", 1, 100, 9)],
        });

        let table = state.table("Exercise").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(RowId::new(1)).unwrap().payload, vec![9]);
    }

    #[test]
    fn preferences_set_and_clear() {
        let mut state = State::default();
        state.apply(CommitRecord {
            sequence: SequenceNumber::new(1),
            writes: vec![JournalWrite::Preference {
                key: "lang".into(),
                value: Some("en".into()),
            }],
        });
        assert_eq!(state.preference("lang"), Some("en"));

        state.apply(CommitRecord {
            sequence: SequenceNumber::new(2),
            writes: vec![JournalWrite::Preference {
                key: "lang".into(),
                value: None,
            }],
        });
        assert_eq!(state.preference("lang"), None);
    }
}
