//! Sync command implementation.

use bodybuddy_store::Store;
use bodybuddy_sync::{EntityKind, SyncConfig, SyncEngine, SyncReport};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Connection settings from the command line.
#[derive(Debug)]
pub struct SyncOptions {
    /// API base URL.
    pub base_url: String,
    /// API token.
    pub token: String,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
}

/// Outcome of one kind's sync.
#[derive(Debug, Serialize)]
pub struct KindResult {
    /// Kind that was synced.
    pub kind: String,
    /// Whether the sync completed.
    pub ok: bool,
    /// Pages fetched.
    pub pages: usize,
    /// Records fetched.
    pub records: usize,
    /// Rows created.
    pub inserted: usize,
    /// Rows changed.
    pub updated: usize,
    /// Rows already current.
    pub unchanged: usize,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Error message if the sync failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KindResult {
    fn completed(report: &SyncReport) -> Self {
        Self {
            kind: report.kind.to_string(),
            ok: true,
            pages: report.fetch.pages,
            records: report.fetch.records,
            inserted: report.merge.inserted,
            updated: report.merge.updated,
            unchanged: report.merge.unchanged,
            elapsed_ms: report.duration.as_millis() as u64,
            error: None,
        }
    }

    fn failed(kind: EntityKind, error: String) -> Self {
        Self {
            kind: kind.to_string(),
            ok: false,
            pages: 0,
            records: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            elapsed_ms: 0,
            error: Some(error),
        }
    }
}

/// Runs the sync command. Kinds sync concurrently; all kinds if none given.
pub async fn run(
    path: &Path,
    kinds: &[EntityKind],
    options: SyncOptions,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let kinds: Vec<EntityKind> = if kinds.is_empty() {
        EntityKind::ALL.to_vec()
    } else {
        let mut unique = kinds.to_vec();
        unique.sort();
        unique.dedup();
        unique
    };

    let mut config = SyncConfig::new(options.base_url, options.token);
    if let Some(secs) = options.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let store = Arc::new(Store::open(path)?);
    let engine = Arc::new(SyncEngine::connect(Arc::clone(&store), config)?);

    let handles: Vec<_> = kinds
        .iter()
        .map(|kind| (*kind, engine.spawn_sync(*kind)))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (kind, handle) in handles {
        let result = match handle.await? {
            Ok(report) => KindResult::completed(&report),
            Err(err) => KindResult::failed(kind, err.to_string()),
        };
        results.push(result);
    }
    store.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => print_text_output(&results),
    }

    let failed = results.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        return Err(format!("{failed} of {} syncs failed", results.len()).into());
    }
    Ok(())
}

fn print_text_output(results: &[KindResult]) {
    for result in results {
        match &result.error {
            None => println!(
                "✓ {:<12} {} records in {} pages ({} new, {} updated, {} unchanged) in {} ms",
                result.kind,
                result.records,
                result.pages,
                result.inserted,
                result.updated,
                result.unchanged,
                result.elapsed_ms
            ),
            Some(error) => println!("✗ {:<12} {}", result.kind, error),
        }
    }
}
