use log::warn;
use serde_json::json;
use tele_core::{ExecutionContext, StageDefinition, StageError, StageKind, StageReport, StageRunResult};

use super::IMAGE_DETECTIONS;
use crate::enrichment::EnrichmentMerger;
use crate::lake::DataLake;

/// Enriquecimiento de las imágenes del lake.
pub struct EnrichStage {
    lake: DataLake,
    merger: Option<EnrichmentMerger>,
}

impl EnrichStage {
    pub fn new(lake: DataLake, merger: Option<EnrichmentMerger>) -> Self {
        Self { lake, merger }
    }
}

impl StageDefinition for EnrichStage {
    fn id(&self) -> &str {
        IMAGE_DETECTIONS
    }

    fn kind(&self) -> StageKind {
        StageKind::Enrichment
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        let Some(merger) = &self.merger else {
            warn!("no detector configured; skipping image enrichment");
            return Ok(StageReport::new(json!({ "skipped": "no detector configured" })));
        };
        let artifacts = self.lake
                            .image_artifacts()
                            .map_err(|e| StageError::failed(format!("cannot list images: {e}")))?;
        let summary = merger.enrich(&artifacts, &ctx.cancel);
        ctx.check_cancelled()?;
        Ok(StageReport::from_serialize(&summary))
    }
}
