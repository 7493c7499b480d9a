//! Integration tests for the intake store.

use chrono::{NaiveDate, TimeZone, Utc};
use intake_ledger::{ContentId, DocumentRecord, IntakeConfig, IntakeStore, ManualClock};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const HELLO_DIGEST: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn test_store(dir: &TempDir, clock: Arc<ManualClock>) -> IntakeStore {
    IntakeStore::create_with_clock(
        IntakeConfig {
            root: dir.path().join("uploads"),
            ..Default::default()
        },
        clock,
    )
    .unwrap()
}

fn clock_at(y: i32, m: u32, d: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(y, m, d, 14, 5, 9).unwrap()))
}

// --- End-to-end ---

#[test]
fn test_ingest_hello_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir, clock_at(2024, 3, 5));

    let before = store.ledger().unwrap();
    let record = store.ingest(b"hello").unwrap();

    assert_eq!(record.content_id.to_hex(), HELLO_DIGEST);
    assert!(record.submitted_flag);
    assert_eq!(record.timestamp, "2024-03-05T14:05:09.000Z");

    // Record lands at json/<day>/<digest>.json
    let path = dir
        .path()
        .join("uploads/json/2024-03-05")
        .join(format!("{}.json", HELLO_DIGEST));
    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk["contentId"], HELLO_DIGEST);
    assert_eq!(on_disk["submittedFlag"], true);
    assert_eq!(on_disk["timestamp"], "2024-03-05T14:05:09.000Z");

    let after = store.ledger().unwrap();
    assert_eq!(after.processed_count, before.processed_count + 1);
    assert_eq!(after.daily["2024-03-05"], 0);
    assert_eq!(after.total_tokens, 0);
    assert_eq!(after.recent[0].content_id.to_hex(), HELLO_DIGEST);
    assert_eq!(after.recent[0].status, "ok");
    assert_eq!(after.recent[0].tokens_used, 0);
}

#[test]
fn test_record_readable_through_store() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir, clock_at(2024, 3, 5));

    let record = store.ingest(b"%PDF-1.7 ...").unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    assert_eq!(store.record(day, &record.content_id).unwrap(), Some(record.clone()));
    assert_eq!(store.records_on(day).unwrap(), vec![record.content_id]);
    assert_eq!(store.dates().unwrap(), vec![day]);
}

// --- Re-ingestion ---

#[test]
fn test_reingest_same_day_overwrites_and_counts_twice() {
    let dir = TempDir::new().unwrap();
    let clock = clock_at(2024, 3, 5);
    let store = test_store(&dir, clock.clone());

    let first = store.ingest(b"same bytes").unwrap();
    clock.set(Utc.with_ymd_and_hms(2024, 3, 5, 18, 0, 0).unwrap());
    let second = store.ingest(b"same bytes").unwrap();

    assert_eq!(first.content_id, second.content_id);
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    assert_eq!(store.records_on(day).unwrap().len(), 1);

    // A fresh handle reads the overwritten file, not a cached copy.
    drop(store);
    let reopened = test_store(&dir, clock);
    let stored = reopened.record(day, &first.content_id).unwrap().unwrap();
    assert_eq!(stored.timestamp, "2024-03-05T18:00:00.000Z");
    assert_eq!(reopened.ledger().unwrap().processed_count, 2);
}

#[test]
fn test_same_bytes_on_different_days_get_separate_records() {
    let dir = TempDir::new().unwrap();
    let clock = clock_at(2024, 3, 5);
    let store = test_store(&dir, clock.clone());

    let a = store.ingest(b"report").unwrap();
    clock.set(Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap());
    let b = store.ingest(b"report").unwrap();

    assert_eq!(a.content_id, b.content_id);
    assert_eq!(store.dates().unwrap().len(), 2);

    let ledger = store.ledger().unwrap();
    assert_eq!(ledger.daily.len(), 2);
    assert_eq!(ledger.processed_count, 2);
}

// --- Ledger behavior through the pipeline ---

#[test]
fn test_recent_window_keeps_last_five() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir, clock_at(2024, 3, 5));

    let ids: Vec<ContentId> = (0..9)
        .map(|i| store.ingest(format!("doc-{}", i).as_bytes()).unwrap().content_id)
        .collect();

    let ledger = store.ledger().unwrap();
    assert_eq!(ledger.processed_count, 9);
    assert_eq!(ledger.recent.len(), 5);

    let window: Vec<ContentId> = ledger.recent.iter().map(|e| e.content_id).collect();
    let expected: Vec<ContentId> = ids.iter().rev().take(5).copied().collect();
    assert_eq!(window, expected);
}

#[test]
fn test_month_rollover_resets_ledger() {
    let dir = TempDir::new().unwrap();
    let clock = clock_at(2024, 3, 28);
    let store = test_store(&dir, clock.clone());

    for i in 0..3 {
        store.ingest(format!("march-{}", i).as_bytes()).unwrap();
    }
    assert_eq!(store.ledger().unwrap().processed_count, 3);

    clock.set(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 1).unwrap());
    let record = store.ingest(b"april").unwrap();

    let ledger = store.ledger().unwrap();
    assert_eq!(ledger.month, "2024-04");
    assert_eq!(ledger.processed_count, 1);
    assert_eq!(ledger.total_tokens, 0);
    assert_eq!(ledger.daily.keys().collect::<Vec<_>>(), vec!["2024-04-01"]);
    assert_eq!(ledger.recent.len(), 1);
    assert_eq!(ledger.recent[0].content_id, record.content_id);

    // Records from March are untouched by the ledger reset.
    let march = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
    assert_eq!(store.records_on(march).unwrap().len(), 3);
}

#[test]
fn test_ledger_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let clock = clock_at(2024, 3, 5);
    {
        let store = test_store(&dir, clock.clone());
        store.ingest(b"one").unwrap();
        store.ingest(b"two").unwrap();
    }

    let store = test_store(&dir, clock);
    let ledger = store.ledger().unwrap();
    assert_eq!(ledger.processed_count, 2);
    assert_eq!(ledger.recent[0].content_id, ContentId::from_bytes(b"two"));
}

#[test]
fn test_status_reports_ledger() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir, clock_at(2024, 3, 5));
    store.ingest(b"doc").unwrap();

    let status = store.status();
    assert!(status.online);
    assert!(status.error.is_none());
    assert_eq!(status.ledger.unwrap().processed_count, 1);
}

#[test]
fn test_record_json_matches_returned_record() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir, clock_at(2024, 3, 5));
    let record = store.ingest(b"compare").unwrap();

    let path = dir
        .path()
        .join("uploads/json/2024-03-05")
        .join(format!("{}.json", record.content_id));
    let parsed: DocumentRecord = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(parsed, record);
}
