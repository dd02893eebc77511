use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tele_adapters::{DataLake, IdempotentLoader};
use tele_core::CancelToken;
use tele_domain::{DerivedFact, Detection, FactInsertOutcome, IncomingRecord, InMemoryRawStore, RawRecord, RawStore, RecordId,
                  StoreError};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).expect("date")
}

fn setup() -> (tempfile::TempDir, DataLake, Arc<InMemoryRawStore>, IdempotentLoader) {
    let dir = tempfile::tempdir().expect("tempdir");
    let lake = DataLake::new(dir.path());
    let store = Arc::new(InMemoryRawStore::new());
    let loader = IdempotentLoader::new(store.clone(), 2);
    (dir, lake, store, loader)
}

#[test]
fn reloading_an_edited_message_overwrites_the_single_row() {
    let (_dir, _lake, store, loader) = setup();
    loader.load_batch("X.json", "X", vec![json!({ "id": 1, "message": "hello" })]).expect("first load");
    loader.load_batch("X.json", "X", vec![json!({ "id": 1, "message": "hello v2" })]).expect("second load");

    let records = store.records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_channel, "X");
    assert_eq!(records[0].payload["message"], "hello v2");
}

#[test]
fn loading_the_same_lake_twice_is_idempotent() {
    let (_dir, lake, store, loader) = setup();
    lake.write_partition(day(1), "shop_a", &[json!({ "id": 10, "message": "a" }), json!({ "id": 11, "message": "b" })])
        .expect("write");
    lake.write_partition(day(1), "shop_b", &[json!({ "id": 20, "message": "c" })]).expect("write");
    let units = lake.source_units().expect("units");

    let snapshot = || -> Vec<(RecordId, String, Value)> {
        store.records()
             .expect("records")
             .into_iter()
             .map(|r| (r.record_id, r.source_channel, r.payload))
             .collect()
    };

    let first = loader.load_units(&units, &CancelToken::new());
    let after_first = snapshot();
    let second = loader.load_units(&units, &CancelToken::new());
    let after_second = snapshot();

    assert_eq!(first.source_units, 2);
    assert_eq!(first.upserted, 3);
    assert_eq!(second.upserted, 3);
    assert_eq!(after_first.len(), 3);
    assert_eq!(after_first, after_second);
    assert_eq!(after_second[2], (20, "shop_b".to_string(), json!({ "id": 20, "message": "c" })));
}

#[test]
fn concurrent_writers_on_one_id_leave_a_single_row() {
    let (_dir, _lake, store, loader) = setup();
    let payloads: Vec<Value> = (0..8).map(|i| json!({ "id": 42, "message": format!("writer {i}") })).collect();

    thread::scope(|s| {
        for (i, payload) in payloads.iter().enumerate() {
            let loader = &loader;
            s.spawn(move || {
                loader.load_batch(&format!("w{i}.json"), "X", vec![payload.clone()]).expect("load");
            });
        }
    });

    let records = store.records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, 42);
    assert_eq!(records[0].source_channel, "X");
    assert!(payloads.contains(&records[0].payload));
}

#[test]
fn later_partition_wins_for_repeated_ids() {
    let (_dir, lake, store, loader) = setup();
    lake.write_partition(day(2), "shop", &[json!({ "id": 5, "message": "new" })]).expect("write");
    lake.write_partition(day(1), "shop", &[json!({ "id": 5, "message": "old" })]).expect("write");

    loader.load_units(&lake.source_units().expect("units"), &CancelToken::new());

    let rec = store.record(5).expect("read").expect("present");
    assert_eq!(rec.payload["message"], "new");
}

#[test]
fn invalid_messages_are_skipped_without_aborting_the_unit() {
    let (_dir, _lake, store, loader) = setup();
    let summary = loader.load_batch("mixed.json",
                                    "mixed",
                                    vec![json!({ "id": 1 }), json!({ "message": "no id" }), json!({ "id": null }), json!({ "id": 2 })])
                        .expect("load");

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.skipped_invalid, 2);
    assert_eq!(store.count_records().expect("count"), 2);
}

#[test]
fn malformed_unit_is_rolled_back_and_the_rest_still_loads() {
    let (_dir, lake, store, loader) = setup();
    lake.write_partition(day(1), "good", &[json!({ "id": 1, "message": "ok" })]).expect("write");
    let broken = lake.partition_file(day(1), "broken");
    fs::write(&broken, b"[{\"id\": 2, \"message\": ").expect("write broken");

    let summary = loader.load_units(&lake.source_units().expect("units"), &CancelToken::new());

    assert_eq!(summary.source_units, 2);
    assert_eq!(summary.failed_units, 1);
    assert_eq!(summary.upserted, 1);
    assert!(store.record(2).expect("read").is_none());
}

#[test]
fn cancelled_load_commits_nothing() {
    let (_dir, lake, store, loader) = setup();
    lake.write_partition(day(1), "shop", &[json!({ "id": 1 })]).expect("write");
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = loader.load_units(&lake.source_units().expect("units"), &cancel);

    assert_eq!(summary.upserted, 0);
    assert_eq!(store.count_records().expect("count"), 0);
}

/// Store que borra un archivo del lake al confirmar la primera unidad.
struct UnlinkOnFirstCommit {
    inner: InMemoryRawStore,
    victim: Mutex<Option<PathBuf>>,
}

impl RawStore for UnlinkOnFirstCommit {
    fn upsert_unit(&self, unit: &str, records: &[IncomingRecord], loaded_at: DateTime<Utc>) -> Result<usize, StoreError> {
        if let Some(path) = self.victim.lock().expect("lock").take() {
            fs::remove_file(path).expect("unlink");
        }
        self.inner.upsert_unit(unit, records, loaded_at)
    }
    fn insert_facts(&self,
                    record_id: RecordId,
                    detections: &[Detection],
                    detected_at: DateTime<Utc>)
                    -> Result<FactInsertOutcome, StoreError> {
        self.inner.insert_facts(record_id, detections, detected_at)
    }
    fn record(&self, record_id: RecordId) -> Result<Option<RawRecord>, StoreError> {
        self.inner.record(record_id)
    }
    fn records(&self) -> Result<Vec<RawRecord>, StoreError> {
        self.inner.records()
    }
    fn facts_for(&self, record_id: RecordId) -> Result<Vec<DerivedFact>, StoreError> {
        self.inner.facts_for(record_id)
    }
    fn facts(&self) -> Result<Vec<DerivedFact>, StoreError> {
        self.inner.facts()
    }
}

#[test]
fn units_are_read_one_chunk_at_a_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lake = DataLake::new(dir.path());
    lake.write_partition(day(1), "a", &[json!({ "id": 1 })]).expect("write");
    let second = lake.write_partition(day(1), "b", &[json!({ "id": 2 })]).expect("write");
    let store = Arc::new(UnlinkOnFirstCommit { inner: InMemoryRawStore::new(),
                                               victim: Mutex::new(Some(second)) });
    let loader = IdempotentLoader::new(store.clone(), 1);

    let summary = loader.load_units(&lake.source_units().expect("units"), &CancelToken::new());

    // "b" se lee después del commit de "a", cuando ya no existe.
    assert_eq!(summary.source_units, 2);
    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.failed_units, 1);
    assert!(store.record(1).expect("read").is_some());
    assert!(store.record(2).expect("read").is_none());
}
