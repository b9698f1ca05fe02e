//! End-to-end sync tests against canned remote pages.

use bodybuddy_store::storage::{InMemoryBackend, StorageBackend};
use bodybuddy_store::{Config, Store, StoreError, StoreResult};
use bodybuddy_sync::{
    EntityKind, Exercise, HttpResponse, Language, MockHttpClient, SyncConfig, SyncEngine,
    SyncError, SyncEvent, SyncState, WeightUnit,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const BASE: &str = "http://wger.test/api/v2/";

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

fn engine_over(store: Store, client: MockHttpClient) -> SyncEngine<MockHttpClient> {
    SyncEngine::new(Arc::new(store), SyncConfig::new(BASE, "secret"), client)
}

fn engine(client: MockHttpClient) -> SyncEngine<MockHttpClient> {
    engine_over(Store::open_in_memory().unwrap(), client)
}

/// Serves exercise pages `exercise?language=2`, `...&page=2`, ... in order.
fn exercise_pages(pages: &[Value]) -> MockHttpClient {
    let client = MockHttpClient::new();
    for (i, results) in pages.iter().enumerate() {
        let here = page_url(i);
        let next = if i + 1 < pages.len() {
            Value::String(page_url(i + 1))
        } else {
            Value::Null
        };
        client.respond_json(&here, &json!({"count": 0, "next": next, "results": results}));
    }
    client
}

fn page_url(index: usize) -> String {
    if index == 0 {
        url("exercise?language=2")
    } else {
        url(&format!("exercise?language=2&page={}", index + 1))
    }
}

/// A backend whose appends start failing once `budget` appends succeeded.
#[derive(Debug)]
struct FailingBackend {
    inner: InMemoryBackend,
    budget: Arc<AtomicUsize>,
}

impl StorageBackend for FailingBackend {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        self.inner.append(data)
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> StoreResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        self.inner.truncate(new_size)
    }
}

#[tokio::test]
async fn idempotent_sync() {
    let client = exercise_pages(&[json!([
        {"id": 1, "name": "Squat", "description": "Legs"},
        {"id": 2, "name": "Bench press"}
    ])]);
    let engine = engine(client);

    engine.sync(EntityKind::Exercise).await.unwrap();
    let before = engine.store().rows::<Exercise>().unwrap();
    let report = engine.sync(EntityKind::Exercise).await.unwrap();
    let after = engine.store().rows::<Exercise>().unwrap();

    assert_eq!(before, after);
    assert_eq!(report.merge.unchanged, 2);
    assert_eq!(report.merge.inserted, 0);
}

#[tokio::test]
async fn later_value_overwrites() {
    let client = MockHttpClient::new();
    client.respond_json(&url("exercise?language=2"), &json!({"next": null, "results": [{"id": 7, "name": "Squat"}]}));
    client.respond_json(&url("exercise?language=2"), &json!({"next": null, "results": [{"id": 7, "name": "Squat2"}]}));
    let engine = engine(client);

    engine.sync(EntityKind::Exercise).await.unwrap();
    engine.sync(EntityKind::Exercise).await.unwrap();

    let rows = engine.store().rows::<Exercise>().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.id, 7);
    assert_eq!(rows[0].1.name.as_deref(), Some("Squat2"));
}

#[tokio::test]
async fn three_pages_are_merged_in_order() {
    let client = exercise_pages(&[
        json!([{"id": 1}, {"id": 2}]),
        json!([{"id": 3}]),
        json!([{"id": 4}, {"id": 5}]),
    ]);
    let engine = engine(client);
    let mut events = engine.subscribe();

    let report = engine.sync(EntityKind::Exercise).await.unwrap();

    assert_eq!(report.fetch.pages, 3);
    assert_eq!(report.fetch.records, 5);
    assert_eq!(engine.store().count("Exercise"), 5);

    let mut merged_pages = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::PageMerged { page, .. } = event {
            merged_pages.push(page);
        }
    }
    assert_eq!(merged_pages, vec![0, 1, 2]);
}

#[tokio::test]
async fn not_found_detail_becomes_invalid_response() {
    let client = MockHttpClient::new();
    client.respond(
        &url("weightunit"),
        HttpResponse::with_status(404, json!({"detail": "not found"}).to_string()),
    );
    let engine = engine(client);

    let err = engine.sync(EntityKind::WeightUnit).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidResponse(ref m) if m == "not found"));
    assert_eq!(engine.store().count("WeightUnit"), 0);
    assert_eq!(engine.state(EntityKind::WeightUnit), SyncState::Error);
}

#[tokio::test]
async fn failure_on_second_page_keeps_first() {
    let client = MockHttpClient::new();
    client.respond_json(&page_url(0), &json!({"next": page_url(1), "results": [{"id": 1}]}));
    client.respond(&page_url(1), HttpResponse::with_status(500, "{}"));
    client.respond_json(&page_url(2), &json!({"next": null, "results": [{"id": 3}]}));
    let engine = engine(client);

    let err = engine.sync(EntityKind::Exercise).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidResponse(ref m) if m == "status: 500"));
    assert_eq!(engine.store().count("Exercise"), 1);
    assert!(!engine
        .fetcher()
        .client()
        .requested_urls()
        .contains(&page_url(2)));
}

#[tokio::test]
async fn commit_failure_is_persistence_error() {
    let budget = Arc::new(AtomicUsize::new(1));
    let backend = FailingBackend {
        inner: InMemoryBackend::new(),
        budget: Arc::clone(&budget),
    };
    let store = Store::open_with_backend(Config::default(), Box::new(backend)).unwrap();
    let client = exercise_pages(&[json!([{"id": 1}]), json!([{"id": 2}]), json!([{"id": 3}])]);
    let engine = engine_over(store, client);

    let err = engine.sync(EntityKind::Exercise).await.unwrap_err();

    assert!(matches!(err, SyncError::Persistence(_)));
    assert!(err.is_local());
    let ids: Vec<i64> = engine
        .store()
        .rows::<Exercise>()
        .unwrap()
        .into_iter()
        .map(|(_, row)| row.id)
        .collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(engine.fetcher().client().requested_urls().len(), 2);
}

#[tokio::test]
async fn description_and_relationships() {
    let client = exercise_pages(&[json!([{
        "id": 9,
        "name": "Curl",
        "description": "<p>Biceps</p>",
        "category": 8,
        "muscles": [1],
        "equipment": [3],
        "language": 2,
        "creation_date": "2023-01-01T10:00:00Z"
    }])]);
    let engine = engine(client);

    let report = engine.sync(EntityKind::Exercise).await.unwrap();

    let (_, row) = engine.store().find_by_remote_id::<Exercise>(9).unwrap().unwrap();
    assert_eq!(row.desc.as_deref(), Some("<p>Biceps</p>"));
    assert_eq!(row.creation_date.as_deref(), Some("2023-01-01T10:00:00Z"));
    assert_eq!(report.merge.unsupported, 4);
}

#[tokio::test]
async fn kinds_sync_concurrently_and_same_kind_serializes() {
    let client = MockHttpClient::new();
    client.respond_json(
        &url("language"),
        &json!({"next": null, "results": [{"id": 2, "short_name": "en", "full_name": "English"}]}),
    );
    client.respond_json(
        &url("weightunit"),
        &json!({"next": null, "results": [{"id": 1, "name": "kg"}, {"id": 2, "name": "lb"}]}),
    );
    let engine = Arc::new(engine(client));

    let handles = vec![
        engine.spawn_sync(EntityKind::Language),
        engine.spawn_sync(EntityKind::Language),
        engine.spawn_sync(EntityKind::WeightUnit),
        engine.spawn_sync(EntityKind::WeightUnit),
    ];
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.store().rows::<Language>().unwrap().len(), 1);
    assert_eq!(engine.store().rows::<WeightUnit>().unwrap().len(), 2);
    assert_eq!(engine.stats().syncs_completed, 4);
}

#[tokio::test]
async fn synced_rows_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.bbj");

    {
        let client = MockHttpClient::new();
        client.respond_json(
            &url("exercisecategory"),
            &json!({"next": null, "results": [{"id": 10, "name": "Arms"}, {"id": 11, "name": "Legs"}]}),
        );
        let engine = engine_over(Store::open(&path).unwrap(), client);
        engine.sync(EntityKind::Category).await.unwrap();
        engine.store().close().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count("Category"), 2);
}

#[tokio::test]
async fn completed_event_carries_report() {
    let client = MockHttpClient::new();
    client.respond_json(&url("weightunit"), &json!({"next": null, "results": [{"id": 1, "name": "kg"}]}));
    let engine = engine(client);
    let mut events = engine.subscribe();

    let report = engine.sync(EntityKind::WeightUnit).await.unwrap();

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(SyncEvent::Completed {
            kind: EntityKind::WeightUnit,
            report
        })
    );
}

proptest! {
    #[test]
    fn merges_never_duplicate_remote_ids(
        pages in prop::collection::vec(prop::collection::vec((0i64..20, "[a-z]{1,6}"), 0..8), 1..5)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let client = MockHttpClient::new();
        for (i, page) in pages.iter().enumerate() {
            let results: Vec<Value> = page
                .iter()
                .map(|(id, name)| json!({"id": id, "name": name}))
                .collect();
            let next = if i + 1 < pages.len() { Value::String(url(&format!("weightunit?page={}", i + 2))) } else { Value::Null };
            let here = if i == 0 { url("weightunit") } else { url(&format!("weightunit?page={}", i + 1)) };
            client.respond_json(&here, &json!({"next": next, "results": results}));
        }
        let engine = engine(client);

        runtime.block_on(engine.sync(EntityKind::WeightUnit)).unwrap();

        let rows = engine.store().rows::<WeightUnit>().unwrap();
        let mut ids: Vec<i64> = rows.iter().map(|(_, r)| r.id).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);

        let mut expected: Vec<i64> = pages.iter().flatten().map(|(id, _)| *id).collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(ids, expected);
    }
}
