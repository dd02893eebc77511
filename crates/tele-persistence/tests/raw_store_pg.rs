mod test_support;

use chrono::Utc;
use serde_json::json;
use tele_domain::{Detection, FactInsertOutcome, IncomingRecord, RawStore};
use tele_persistence::pg::{PgRawStore, PoolProvider};
use test_support::{unique_base_id, with_pool};

fn incoming(id: i64, channel: &str, text: &str) -> IncomingRecord {
    IncomingRecord { record_id: id,
                     source_channel: channel.into(),
                     payload: json!({ "id": id, "text": text }) }
}

#[test]
fn reload_overwrites_payload_keeps_single_row() {
    let ran = with_pool(|pool| {
        let store = PgRawStore::new(PoolProvider { pool: pool.clone() });
        let id = unique_base_id() + 1;
        let t0 = Utc::now();
        assert_eq!(store.upsert_unit("day1/X.json", &[incoming(id, "X", "hello")], t0).expect("upsert"), 1);
        let before = store.count_records().expect("count");
        store.upsert_unit("day2/X.json", &[incoming(id, "Y", "hello v2")], Utc::now()).expect("upsert");

        assert_eq!(store.count_records().expect("count"), before);
        let row = store.record(id).expect("read").expect("row");
        assert_eq!(row.payload["text"], "hello v2");
        assert_eq!(row.source_channel, "X");
        assert!(row.loaded_at >= t0);
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn repeated_id_inside_one_unit_is_accepted() {
    let ran = with_pool(|pool| {
        let store = PgRawStore::new(PoolProvider { pool: pool.clone() });
        let id = unique_base_id() + 2;
        let n = store.upsert_unit("dup.json", &[incoming(id, "X", "a"), incoming(id, "X", "b")], Utc::now())
                     .expect("upsert");
        assert_eq!(n, 2);
        assert_eq!(store.record(id).expect("read").expect("row").payload["text"], "b");
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn facts_first_write_wins() {
    let ran = with_pool(|pool| {
        let store = PgRawStore::new(PoolProvider { pool: pool.clone() });
        let id = unique_base_id() + 7;
        let first = store.insert_facts(id, &[Detection::new("box", 0.9)], Utc::now()).expect("insert");
        assert_eq!(first, FactInsertOutcome { written: 1, duplicates: 0 });
        let second = store.insert_facts(id, &[Detection::new("box", 0.99)], Utc::now()).expect("insert");
        assert_eq!(second, FactInsertOutcome { written: 0, duplicates: 1 });
        let facts = store.facts_for(id).expect("facts");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].confidence, 0.9);
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}

#[test]
fn out_of_range_confidence_rolls_back_whole_artifact() {
    let ran = with_pool(|pool| {
        let store = PgRawStore::new(PoolProvider { pool: pool.clone() });
        let id = unique_base_id() + 9;
        let res = store.insert_facts(id, &[Detection::new("ok", 0.8), Detection::new("bad", 1.5)], Utc::now());
        assert!(res.is_err());
        assert!(store.facts_for(id).expect("facts").is_empty());
    });
    if ran.is_none() {
        eprintln!("skip (no DATABASE_URL)");
    }
}
