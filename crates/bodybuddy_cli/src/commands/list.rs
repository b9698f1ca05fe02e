//! List command implementation.

use super::{is_sortable, open_existing, sorted_rows, text};
use bodybuddy_sync::EntityKind;
use serde_json::Value;
use std::path::Path;

/// Runs the list command.
pub fn run(
    path: &Path,
    kind: EntityKind,
    sort: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let sort = sort.unwrap_or(kind.default_sort());
    if !is_sortable(kind, sort) {
        return Err(format!("{kind} has no sortable attribute `{sort}`").into());
    }

    let store = open_existing(path)?;
    let rows = sorted_rows(&store, kind, sort)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => print_text_output(kind, &rows),
    }
    Ok(())
}

fn print_text_output(kind: EntityKind, rows: &[Value]) {
    for row in rows {
        let id = text(&row["id"]);
        match kind {
            EntityKind::Language => println!(
                "{:>6}  {:<4} {}",
                id,
                text(&row["short_name"]),
                text(&row["full_name"])
            ),
            _ => println!("{:>6}  {}", id, text(&row["name"])),
        }
    }
    println!();
    println!("{} {} rows", rows.len(), kind);
}
