use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tele_adapters::EnrichmentMerger;
use tele_core::CancelToken;
use tele_domain::{ArtifactRef, ConfidenceThreshold, Detection, Detector, DetectorError, InMemoryRawStore, RawStore};

/// Detector fijo indexado por nombre de archivo.
struct FixedDetector {
    answers: HashMap<String, Vec<Detection>>,
}

impl FixedDetector {
    fn new(answers: &[(&str, Vec<Detection>)]) -> Self {
        Self { answers: answers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect() }
    }
}

impl Detector for FixedDetector {
    fn detect(&self, artifact: &Path) -> Result<Vec<Detection>, DetectorError> {
        let name = artifact.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.answers
            .get(name)
            .cloned()
            .ok_or_else(|| DetectorError::Unreadable(artifact.display().to_string()))
    }
}

fn artifact(id: i64) -> ArtifactRef {
    ArtifactRef { record_id: id,
                  path: format!("/lake/telegram_images/{id}.jpg").into() }
}

fn merger(store: &Arc<InMemoryRawStore>, detector: FixedDetector) -> EnrichmentMerger {
    EnrichmentMerger::new(store.clone(), Arc::new(detector), ConfidenceThreshold::default(), 2)
}

#[test]
fn only_confident_detections_become_facts() {
    let store = Arc::new(InMemoryRawStore::new());
    let detector = FixedDetector::new(&[("7.jpg", vec![Detection::new("box", 0.9), Detection::new("bag", 0.3)])]);
    let summary = merger(&store, detector).enrich(&[artifact(7)], &CancelToken::new());

    let facts = store.facts_for(7).expect("facts");
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].fact_label, "box");
    assert_eq!(facts[0].confidence, 0.9);
    assert_eq!(summary.facts_written, 1);
    assert_eq!(summary.facts_below_threshold, 1);
}

#[test]
fn replaying_enrichment_writes_no_duplicates() {
    let store = Arc::new(InMemoryRawStore::new());
    let first = merger(&store, FixedDetector::new(&[("7.jpg", vec![Detection::new("box", 0.9)])]));
    first.enrich(&[artifact(7)], &CancelToken::new());

    let second = merger(&store, FixedDetector::new(&[("7.jpg", vec![Detection::new("box", 0.6)])]));
    let summary = second.enrich(&[artifact(7)], &CancelToken::new());

    assert_eq!(summary.facts_written, 0);
    assert_eq!(summary.facts_skipped_duplicate, 1);
    let facts = store.facts_for(7).expect("facts");
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].confidence, 0.9);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let store = Arc::new(InMemoryRawStore::new());
    let detector = FixedDetector::new(&[("3.jpg", vec![Detection::new("bottle", 0.45), Detection::new("cup", 0.4499)])]);
    merger(&store, detector).enrich(&[artifact(3)], &CancelToken::new());

    let labels: Vec<String> = store.facts_for(3).expect("facts").into_iter().map(|f| f.fact_label).collect();
    assert_eq!(labels, vec!["bottle"]);
}

#[test]
fn detector_failure_only_affects_its_artifact() {
    let store = Arc::new(InMemoryRawStore::new());
    let detector = FixedDetector::new(&[("1.jpg", vec![Detection::new("person", 0.8)])]);
    let summary = merger(&store, detector).enrich(&[artifact(1), artifact(2)], &CancelToken::new());

    assert_eq!(summary.artifacts_processed, 1);
    assert_eq!(summary.artifacts_failed, 1);
    assert_eq!(store.facts().expect("facts").len(), 1);
}

#[test]
fn facts_do_not_require_a_raw_record() {
    let store = Arc::new(InMemoryRawStore::new());
    let detector = FixedDetector::new(&[("99.jpg", vec![Detection::new("car", 0.7)])]);
    merger(&store, detector).enrich(&[artifact(99)], &CancelToken::new());

    assert!(store.record(99).expect("read").is_none());
    assert_eq!(store.facts_for(99).expect("facts").len(), 1);
}
