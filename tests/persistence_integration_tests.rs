//! Integration tests for the cached JSON store: durability across restarts,
//! idempotent writes, concurrent writers and the end-to-end access flow.

use activity_store::{
    ActivityService, CachingProxy, Event, EventKind, InstanceRecord, InstanceRegistry,
    JsonFileStore, ManualClock, SnapshotStore, StoreSnapshot,
};
use chrono::{TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn record(activity_id: &str, access_count: u64) -> InstanceRecord {
    let mut record = InstanceRecord::new(
        activity_id,
        serde_json::json!({"size": 10, "words": ["APSI"], "seed": 42}),
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    );
    record.access_count = access_count;
    record
}

fn proxy_at(path: &Path) -> CachingProxy {
    CachingProxy::new(JsonFileStore::new(path))
}

#[tokio::test]
async fn test_upsert_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data").join("store.json");

    let proxy = proxy_at(&path);
    proxy.upsert_instance("inst_A", record("A", 7)).await.unwrap();
    drop(proxy);

    let snapshot = JsonFileStore::new(&path).read_all().await.unwrap();
    assert_eq!(snapshot.instance("inst_A"), Some(&record("A", 7)));

    let restarted = proxy_at(&path);
    assert_eq!(
        restarted.get_instance("inst_A").await.unwrap(),
        Some(record("A", 7))
    );
}

#[tokio::test]
async fn test_repeated_upsert_leaves_identical_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let proxy = proxy_at(&path);

    proxy.upsert_instance("inst_A", record("A", 1)).await.unwrap();
    let once = std::fs::read(&path).unwrap();
    proxy.upsert_instance("inst_A", record("A", 1)).await.unwrap();
    let twice = std::fs::read(&path).unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_file_layout_matches_documented_format() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let proxy = proxy_at(&path);
    proxy.upsert_instance("inst_A", record("A", 0)).await.unwrap();
    proxy
        .append_event(Event::game_access("A", None, Utc::now()))
        .await
        .unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let instance = &raw["instances"]["inst_A"];
    for key in ["instance_id", "activityID", "created_at", "game_config", "last_access", "access_count"] {
        assert!(instance.get(key).is_some(), "missing instance field {}", key);
    }
    let event = &raw["events"][0];
    assert_eq!(event["type"], "game_access");
    assert_eq!(event["activityID"], "A");
    assert!(event["userID"].is_null());
    assert!(event["ts"].is_string());
}

#[tokio::test]
async fn test_external_writer_visible_after_staleness_window() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    let proxy = proxy_at(&path).with_clock(clock.clone());
    assert!(proxy.get_instance("inst_B").await.unwrap().is_none());

    let mut snapshot = StoreSnapshot::new();
    snapshot.instances.insert("inst_B".to_string(), record("B", 2));
    JsonFileStore::new(&path).write_all(&snapshot).await.unwrap();

    assert!(proxy.get_instance("inst_B").await.unwrap().is_none());
    clock.advance(chrono::Duration::milliseconds(1200));
    assert_eq!(proxy.get_instance("inst_B").await.unwrap(), Some(record("B", 2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_to_distinct_ids_are_all_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let proxy = Arc::new(proxy_at(&path));

    let num_tasks = 16;
    let mut handles = vec![];
    for task_id in 0..num_tasks {
        let proxy = Arc::clone(&proxy);
        handles.push(tokio::spawn(async move {
            let activity = format!("act{}", task_id);
            proxy
                .upsert_instance(&format!("inst_{}", activity), record(&activity, task_id))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = JsonFileStore::new(&path).read_all().await.unwrap();
    assert_eq!(snapshot.instances.len(), num_tasks as usize);
    for task_id in 0..num_tasks {
        let stored = snapshot.instance(&format!("inst_act{}", task_id)).unwrap();
        assert_eq!(stored.access_count, task_id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_track_access_loses_no_increments() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let service = Arc::new(
        ActivityService::open(&path, Duration::from_secs(1), "")
            .await
            .unwrap(),
    );

    let mut handles = vec![];
    for task_id in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                service
                    .track_access("SHARED", Some(&format!("u{}", task_id)))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = JsonFileStore::new(&path).read_all().await.unwrap();
    assert_eq!(snapshot.instance("inst_SHARED").unwrap().access_count, 40);
    assert_eq!(snapshot.events.len(), 40);
    assert_eq!(snapshot.events_matching(Some("SHARED"), Some("u3")).count(), 5);
}

#[tokio::test]
async fn test_teste123_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    let proxy = Arc::new(CachingProxy::new(JsonFileStore::new(&path)).with_clock(clock.clone()));
    let service = ActivityService::new(proxy, Arc::new(InstanceRegistry::new()), "");

    let url = service.resolve_instance("TESTE123", None, None).await.unwrap();
    assert_eq!(url.instance_id, "inst_TESTE123");
    let created = service
        .proxy()
        .get_instance("inst_TESTE123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.access_count, 0);

    let mut last_access = None;
    for expected in 1..=3 {
        clock.advance(chrono::Duration::seconds(2));
        let record = service.track_access("TESTE123", Some("u1")).await.unwrap();
        assert_eq!(record.access_count, expected);
        assert!(record.last_access > last_access);
        last_access = record.last_access;
    }

    let events = service
        .proxy()
        .list_events(Some("TESTE123"), Some("u1"))
        .await
        .unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.kind == EventKind::GameAccess));

    let report = service
        .query_analytics("TESTE123", None, Some("events_count"))
        .await
        .unwrap();
    assert_eq!(report.events_count, Some(3));

    // Same state after a restart.
    let reopened = ActivityService::open(&path, Duration::from_secs(1), "").await.unwrap();
    let report = reopened
        .query_analytics("TESTE123", Some("u1"), Some("default"))
        .await
        .unwrap();
    assert_eq!(report.access_count, Some(3));
    assert_eq!(report.events_count, Some(3));
    assert_eq!(report.created_at, Some(Some(created.created_at)));
}

#[tokio::test]
async fn test_unreadable_store_surfaces_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    std::fs::write(&path, b"not json").unwrap();

    let proxy = proxy_at(&path);
    let err = proxy.get_instance("inst_A").await.unwrap_err();
    assert!(err.is_storage_unavailable());

    let err = proxy.upsert_instance("inst_A", record("A", 0)).await.unwrap_err();
    assert!(err.is_storage_unavailable());
    assert_eq!(std::fs::read(&path).unwrap(), b"not json");
}
