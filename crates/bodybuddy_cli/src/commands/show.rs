//! Show command implementation.

use super::{open_existing, row_by_id};
use bodybuddy_sync::EntityKind;
use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, kind: EntityKind, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let row = row_by_id(&store, kind, id)?.ok_or_else(|| format!("No {kind} with id {id}"))?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}
