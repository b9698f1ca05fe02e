//! Inspect command implementation.

use super::open_existing;
use bodybuddy_store::JOURNAL_VERSION;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Journal format version.
    pub format_version: u16,
    /// Number of commit frames.
    pub commits: u64,
    /// Sequence of the last commit.
    pub committed_seq: u64,
    /// Row count per table.
    pub tables: BTreeMap<String, usize>,
    /// Stored preferences.
    pub preferences: BTreeMap<String, String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let stats = store.stats()?;

    let result = InspectResult {
        path: path.display().to_string(),
        journal_size: stats.journal_bytes,
        format_version: JOURNAL_VERSION,
        commits: stats.commits,
        committed_seq: stats.committed_seq.as_u64(),
        tables: stats.tables,
        preferences: stats.preferences,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("BodyBuddy Store Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:           {}", format_size(result.journal_size));
    println!("  Format version: {}", result.format_version);
    println!("  Commits:        {}", result.commits);
    println!("  Last sequence:  {}", result.committed_seq);
    println!();
    println!("Tables:");
    if result.tables.is_empty() {
        println!("  (none)");
    }
    for (table, count) in &result.tables {
        println!("  {table:<12} {count} rows");
    }
    if !result.preferences.is_empty() {
        println!();
        println!("Preferences:");
        for (key, value) in &result.preferences {
            println!("  {key} = {value}");
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
