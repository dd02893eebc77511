use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::json;
use tele_adapters::stages::{ANALYTICS_MODELS, IMAGE_DETECTIONS, RAW_FILES, RAW_RECORDS};
use tele_adapters::DataLake;
use tele_core::{RunStatus, Selection};
use tele_domain::RawStore;
use teleflow::analytics::{channel_activity, search_messages, top_terms};
use teleflow::{scheduler_for, AppConfig, Backend};

fn config(lake: &Path) -> AppConfig {
    let vars: HashMap<&str, String> = [("DATA_LAKE_DIR", lake.display().to_string()),
                                       ("TELEGRAM_CHANNELS", "tikvahpharma".to_string()),
                                       ("PIPELINE_CONCURRENCY", "2".to_string())].into_iter()
                                                                                  .collect();
    AppConfig::from_lookup(|k| vars.get(k).cloned()).expect("config")
}

fn seed(lake: &Path) {
    let lake = DataLake::new(lake);
    let day = NaiveDate::from_ymd_opt(2024, 6, 3).expect("date");
    lake.write_partition(day,
                         "tikvahpharma",
                         &[json!({ "id": 11, "message": "Amoxicillin in stock", "date": "2024-06-03T07:00:00+00:00" }),
                           json!({ "id": 12, "message": "amoxicillin syrup, call now", "date": "2024-06-03T09:30:00+00:00" }),
                           json!({ "message": "no id, dropped" })])
        .expect("seed");
}

#[test]
fn in_memory_pipeline_loads_dropped_files_and_answers_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed(dir.path());
    let cfg = config(dir.path());

    let (mut scheduler, store) = scheduler_for(&cfg, Backend::in_memory()).expect("scheduler");
    let result = scheduler.execute(&Selection::All).expect("run");

    assert_eq!(result.status, RunStatus::Succeeded, "{result}");
    let ids: Vec<&str> = result.stages.iter().map(|s| s.stage_id.as_str()).collect();
    assert_eq!(ids, vec![RAW_FILES, RAW_RECORDS, ANALYTICS_MODELS, IMAGE_DETECTIONS]);
    let load = result.stage(RAW_RECORDS).and_then(|s| s.report.clone()).expect("load report");
    assert_eq!(load["upserted"], 2);
    assert_eq!(load["skipped_invalid"], 1);

    let terms = top_terms(store.as_ref(), 1).expect("terms");
    assert_eq!(terms[0].term, "amoxicillin");
    assert_eq!(terms[0].mentions, 2);

    let activity = channel_activity(store.as_ref(), "tikvahpharma").expect("activity").expect("channel");
    assert_eq!(activity.total_posts, 2);
    assert_eq!(activity.daily.len(), 1);

    let hits = search_messages(store.as_ref(), "SYRUP", 10).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record_id, 12);
}

#[test]
fn successful_run_leaves_nothing_stale_and_is_listed_in_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed(dir.path());
    let cfg = config(dir.path());
    let (mut scheduler, _) = scheduler_for(&cfg, Backend::in_memory()).expect("scheduler");

    assert_eq!(scheduler.stale_stages().expect("stale").len(), 4);
    let first = scheduler.execute(&Selection::All).expect("run");
    assert!(scheduler.stale_stages().expect("stale").is_empty());

    let rerun = scheduler.execute(&Selection::Stale).expect("stale run");
    assert!(rerun.stages.is_empty());
    assert!(rerun.is_success());

    let runs = scheduler.runs().expect("runs");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, first.run_id);
    assert_eq!(scheduler.run_report(first.run_id).expect("report"), first);
}

#[test]
fn unknown_stage_is_rejected_before_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    let (mut scheduler, store) = scheduler_for(&cfg, Backend::in_memory()).expect("scheduler");

    assert!(scheduler.execute(&Selection::stages(["raw_record"])).is_err());
    assert!(scheduler.runs().expect("runs").is_empty());
    assert_eq!(store.count_records().expect("count"), 0);
}
