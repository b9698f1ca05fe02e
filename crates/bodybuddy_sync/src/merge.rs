//! Upsert of remote records into the local store.
//!
//! One call merges one page in a single write scope: every record is
//! matched by remote id against rows staged earlier in the same page and
//! then against committed rows, created if absent, and overwritten
//! attribute by attribute. The scope commits once at the end, so a page is
//! either fully merged or not at all.

use crate::envelope::RemoteRecord;
use crate::error::{SyncError, SyncResult};
use crate::model::{CatalogRow, Category, Exercise, Language, WeightUnit};
use crate::registry::EntityKind;
use bodybuddy_store::{SequenceNumber, Store};
use serde_json::Value;
use tracing::{debug, warn};

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records merged.
    pub records: usize,
    /// Rows created.
    pub inserted: usize,
    /// Rows whose attributes changed.
    pub updated: usize,
    /// Rows already identical to the record.
    pub unchanged: usize,
    /// Present attributes skipped because their kind is unsupported.
    pub unsupported: usize,
    /// Mapped attributes absent from the record.
    pub missing: usize,
    /// Attributes skipped because the JSON type did not fit.
    pub mismatched: usize,
    /// Sequence of the commit, or `None` if nothing needed writing.
    pub sequence: Option<SequenceNumber>,
}

impl MergeReport {
    /// Adds another report's counts; keeps the later sequence.
    pub fn absorb(&mut self, other: &MergeReport) {
        self.records += other.records;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.unsupported += other.unsupported;
        self.missing += other.missing;
        self.mismatched += other.mismatched;
        if other.sequence.is_some() {
            self.sequence = other.sequence;
        }
    }
}

/// Merges one page of `kind` records into `store`.
///
/// # Errors
///
/// Returns [`SyncError::InvalidResponse`] if a record has no integer `id`
/// (nothing is written), or [`SyncError::Persistence`] if the commit fails
/// (the page's writes are discarded).
pub fn merge(store: &Store, kind: EntityKind, records: &[RemoteRecord]) -> SyncResult<MergeReport> {
    match kind {
        EntityKind::Exercise => merge_rows::<Exercise>(store, records),
        EntityKind::Language => merge_rows::<Language>(store, records),
        EntityKind::WeightUnit => merge_rows::<WeightUnit>(store, records),
        EntityKind::Category => merge_rows::<Category>(store, records),
    }
}

/// Merges records into the table of row type `R`.
///
/// # Errors
///
/// Same as [`merge`].
pub fn merge_rows<R: CatalogRow>(store: &Store, records: &[RemoteRecord]) -> SyncResult<MergeReport> {
    let kind = R::KIND;
    let ids = records
        .iter()
        .enumerate()
        .map(|(index, record)| remote_id(record, index))
        .collect::<SyncResult<Vec<i64>>>()?;

    let mut scope = store.begin()?;
    let mut report = MergeReport {
        records: records.len(),
        ..MergeReport::default()
    };

    for (record, id) in records.iter().zip(ids) {
        let existing = scope.find_by_remote_id::<R>(id)?;
        let mut row = match &existing {
            Some((_, row)) => row.clone(),
            None => R::with_remote_id(id),
        };

        for attribute in R::attributes() {
            let Some(value) = record.get(attribute.remote) else {
                debug!(kind = %kind, id, attribute = attribute.local, remote = attribute.remote, "attribute not found");
                report.missing += 1;
                continue;
            };
            if !attribute.is_supported() {
                debug!(kind = %kind, id, attribute = attribute.local, "attribute not supported");
                report.unsupported += 1;
                continue;
            }
            if let Err(mismatch) = attribute.apply(&mut row, value) {
                warn!(kind = %kind, id, attribute = attribute.local, %mismatch, "type mismatch, attribute skipped");
                report.mismatched += 1;
            }
        }

        match existing {
            None => {
                scope.insert(&row)?;
                report.inserted += 1;
            }
            Some((_, before)) if before == row => report.unchanged += 1,
            Some((row_id, _)) => {
                scope.update(row_id, &row)?;
                report.updated += 1;
            }
        }
    }

    if report.unsupported > 0 {
        warn!(
            kind = %kind,
            skipped = report.unsupported,
            "relationship attributes are not supported and were skipped"
        );
    }

    if scope.is_empty() {
        debug!(kind = %kind, records = report.records, "page already up to date");
        return Ok(report);
    }

    let sequence = scope.commit()?;
    debug!(
        kind = %kind,
        %sequence,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        "page merged"
    );
    report.sequence = Some(sequence);
    Ok(report)
}

fn remote_id(record: &RemoteRecord, index: usize) -> SyncResult<i64> {
    match record.get("id") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            SyncError::InvalidResponse(format!("record {index} has non-integer id {n}"))
        }),
        Some(other) => Err(SyncError::InvalidResponse(format!(
            "record {index} has non-integer id {other}"
        ))),
        None => Err(SyncError::InvalidResponse(format!("record {index} has no id"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodybuddy_store::StoredRow;
    use serde_json::json;

    fn records(values: Value) -> Vec<RemoteRecord> {
        serde_json::from_value(values).unwrap()
    }

    fn exercise(store: &Store, id: i64) -> Exercise {
        store.find_by_remote_id::<Exercise>(id).unwrap().unwrap().1
    }

    #[test]
    fn merging_twice_keeps_one_row() {
        let store = Store::open_in_memory().unwrap();
        let page = records(json!([{"id": 7, "name": "Squat"}]));

        let first = merge(&store, EntityKind::Exercise, &page).unwrap();
        let second = merge(&store, EntityKind::Exercise, &page).unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.sequence, None);
        assert_eq!(store.count(Exercise::TABLE), 1);
    }

    #[test]
    fn later_record_updates_row() {
        let store = Store::open_in_memory().unwrap();
        merge(&store, EntityKind::Exercise, &records(json!([{"id": 7, "name": "Squat"}]))).unwrap();
        let report =
            merge(&store, EntityKind::Exercise, &records(json!([{"id": 7, "name": "Squat2"}])))
                .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(exercise(&store, 7).name.as_deref(), Some("Squat2"));
        assert_eq!(store.count(Exercise::TABLE), 1);
    }

    #[test]
    fn description_lands_in_desc() {
        let store = Store::open_in_memory().unwrap();
        merge(&store, EntityKind::Exercise, &records(json!([{"id": 1, "description": "x"}]))).unwrap();
        assert_eq!(exercise(&store, 1).desc.as_deref(), Some("x"));
    }

    #[test]
    fn relationships_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        let report = merge(
            &store,
            EntityKind::Exercise,
            &records(json!([{"id": 1, "name": "Curl", "muscles": [1, 2], "category": 8}])),
        )
        .unwrap();

        assert_eq!(report.unsupported, 2);
        let row = exercise(&store, 1);
        assert_eq!(row.name.as_deref(), Some("Curl"));
    }

    #[test]
    fn duplicate_ids_in_one_page_collapse() {
        let store = Store::open_in_memory().unwrap();
        let report = merge(
            &store,
            EntityKind::Language,
            &records(json!([
                {"id": 2, "short_name": "en", "full_name": "English"},
                {"id": 2, "short_name": "en", "full_name": "English (UK)"}
            ])),
        )
        .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        let rows = store.rows::<Language>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.full_name.as_deref(), Some("English (UK)"));
    }

    #[test]
    fn non_integer_id_rejects_the_page() {
        let store = Store::open_in_memory().unwrap();
        let err = merge(
            &store,
            EntityKind::WeightUnit,
            &records(json!([{"id": 1, "name": "kg"}, {"id": "2", "name": "lb"}])),
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::InvalidResponse(_)));
        assert_eq!(store.count(WeightUnit::TABLE), 0);
    }

    #[test]
    fn missing_and_mismatched_attributes_are_counted() {
        let store = Store::open_in_memory().unwrap();
        let report = merge(
            &store,
            EntityKind::Language,
            &records(json!([{"id": 3, "short_name": 42}])),
        )
        .unwrap();

        assert_eq!(report.missing, 1);
        assert_eq!(report.mismatched, 1);
        let (_, row) = store.find_by_remote_id::<Language>(3).unwrap().unwrap();
        assert_eq!(row.short_name, None);
    }

    #[test]
    fn null_clears_an_attribute() {
        let store = Store::open_in_memory().unwrap();
        merge(&store, EntityKind::Category, &records(json!([{"id": 10, "name": "Arms"}]))).unwrap();
        merge(&store, EntityKind::Category, &records(json!([{"id": 10, "name": null}]))).unwrap();

        let (_, row) = store.find_by_remote_id::<Category>(10).unwrap().unwrap();
        assert_eq!(row.name, None);
    }

    #[test]
    fn absorb_sums_counts() {
        let mut total = MergeReport::default();
        total.absorb(&MergeReport {
            records: 2,
            inserted: 2,
            sequence: Some(SequenceNumber::new(1)),
            ..MergeReport::default()
        });
        total.absorb(&MergeReport {
            records: 1,
            unchanged: 1,
            ..MergeReport::default()
        });

        assert_eq!(total.records, 3);
        assert_eq!(total.inserted, 2);
        assert_eq!(total.sequence, Some(SequenceNumber::new(1)));
    }
}
