//! CLI command implementations.

pub mod inspect;
pub mod language;
pub mod list;
pub mod show;
pub mod sync;

use bodybuddy_store::{Config, Query, Store, StoreResult};
use bodybuddy_sync::{AttributeKind, CatalogRow, Category, EntityKind, Exercise, Language, WeightUnit};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::path::Path;

/// Opens an existing store for reading.
pub fn open_existing(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?} (run `bodybuddy sync` first)", path).into());
    }
    Ok(Store::open_with_config(path, Config::new().create_if_missing(false))?)
}

/// Returns true if `attribute` is a stored attribute of `kind`.
pub fn is_sortable(kind: EntityKind, attribute: &str) -> bool {
    kind.attributes()
        .iter()
        .any(|a| a.local == attribute && a.kind != AttributeKind::Relationship)
}

/// Rows of `kind` as JSON objects, ordered by `attribute`.
pub fn sorted_rows(store: &Store, kind: EntityKind, attribute: &str) -> StoreResult<Vec<Value>> {
    match kind {
        EntityKind::Exercise => sorted::<Exercise>(store, attribute),
        EntityKind::Language => sorted::<Language>(store, attribute),
        EntityKind::WeightUnit => sorted::<WeightUnit>(store, attribute),
        EntityKind::Category => sorted::<Category>(store, attribute),
    }
}

/// The row of `kind` with remote id `id` as a JSON object.
pub fn row_by_id(store: &Store, kind: EntityKind, id: i64) -> StoreResult<Option<Value>> {
    match kind {
        EntityKind::Exercise => find::<Exercise>(store, id),
        EntityKind::Language => find::<Language>(store, id),
        EntityKind::WeightUnit => find::<WeightUnit>(store, id),
        EntityKind::Category => find::<Category>(store, id),
    }
}

fn sorted<R: CatalogRow>(store: &Store, attribute: &str) -> StoreResult<Vec<Value>> {
    let key = attribute.to_string();
    let query = Query::<R>::all()
        .sort_by(move |a, b| compare_values(&to_json(a)[key.as_str()], &to_json(b)[key.as_str()]));
    Ok(store
        .query(&query)?
        .into_iter()
        .map(|(_, row)| to_json(&row))
        .collect())
}

fn find<R: CatalogRow>(store: &Store, id: i64) -> StoreResult<Option<Value>> {
    Ok(store
        .find_by_remote_id::<R>(id)?
        .map(|(_, row)| to_json(&row)))
}

fn to_json<R: Serialize>(row: &R) -> Value {
    serde_json::to_value(row).unwrap_or(Value::Null)
}

/// Orders text case-insensitively and numbers numerically; nulls sort last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(a), Value::String(b)) => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Renders an optional text attribute for tables.
pub fn text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
