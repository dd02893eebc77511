//! Enrichment Merger: detector caja negra sobre cada artefacto y merge
//! monotónico de los hechos resultantes.
//!
//! Los artefactos son independientes: se procesan en paralelo en el pool de
//! workers y cada uno escribe sus hechos en una transacción propia. Un
//! `DetectorError` o un fallo del store sólo afecta a ese artefacto.
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use tele_core::CancelToken;
use tele_domain::{ArtifactRef, ConfidenceThreshold, Detection, Detector, EnrichSummary, RawStore};

use crate::pool::worker_pool;

pub struct EnrichmentMerger {
    store: Arc<dyn RawStore>,
    detector: Arc<dyn Detector>,
    threshold: ConfidenceThreshold,
    concurrency: usize,
}

impl EnrichmentMerger {
    pub fn new(store: Arc<dyn RawStore>, detector: Arc<dyn Detector>, threshold: ConfidenceThreshold, concurrency: usize) -> Self {
        Self { store,
               detector,
               threshold,
               concurrency: concurrency.max(1) }
    }

    pub fn threshold(&self) -> ConfidenceThreshold {
        self.threshold
    }

    /// Procesa un artefacto. `artifacts_processed` cuenta sólo artefactos
    /// cuyos hechos se confirmaron; el resto suma en `artifacts_failed`.
    pub fn enrich_one(&self, artifact: &ArtifactRef) -> EnrichSummary {
        let mut summary = EnrichSummary::default();
        let detections = match self.detector.detect(&artifact.path) {
            Ok(d) => d,
            Err(e) => {
                warn!("detector failed for record {} ({}): {e}", artifact.record_id, artifact.path.display());
                summary.artifacts_failed = 1;
                return summary;
            }
        };
        let (kept, dropped): (Vec<Detection>, Vec<Detection>) =
            detections.into_iter().partition(|d| self.threshold.keeps(d));
        summary.facts_below_threshold = dropped.len();
        for d in &kept {
            debug!("record {}: detected '{}' ({:.2})", artifact.record_id, d.label, d.confidence);
        }

        match self.store.insert_facts(artifact.record_id, &kept, Utc::now()) {
            Ok(outcome) => {
                summary.artifacts_processed = 1;
                summary.facts_written = outcome.written;
                summary.facts_skipped_duplicate = outcome.duplicates;
            }
            Err(e) => {
                warn!("could not store facts for record {}: {e}", artifact.record_id);
                summary.artifacts_failed = 1;
            }
        }
        summary
    }

    /// Procesa todos los artefactos; los que aún no empezaron cuando se
    /// cancela el run se omiten.
    pub fn enrich(&self, artifacts: &[ArtifactRef], cancel: &CancelToken) -> EnrichSummary {
        let step = |a: &ArtifactRef| {
            if cancel.is_cancelled() {
                EnrichSummary::default()
            } else {
                self.enrich_one(a)
            }
        };
        let partials: Vec<EnrichSummary> = match worker_pool("tele-enrich", self.concurrency) {
            Ok(pool) => pool.install(|| artifacts.par_iter().map(step).collect()),
            Err(e) => {
                warn!("worker pool unavailable ({e}); enriching sequentially");
                artifacts.iter().map(step).collect()
            }
        };
        let mut summary = EnrichSummary::default();
        for p in &partials {
            summary.merge(p);
        }
        info!("enrichment complete: {} artifacts ({} failed), {} facts written, {} duplicates, {} below threshold",
              summary.artifacts_processed,
              summary.artifacts_failed,
              summary.facts_written,
              summary.facts_skipped_duplicate,
              summary.facts_below_threshold);
        summary
    }
}
