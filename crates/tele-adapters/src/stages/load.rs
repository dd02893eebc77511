use tele_core::{ExecutionContext, StageDefinition, StageError, StageKind, StageReport, StageRunResult};

use super::RAW_RECORDS;
use crate::lake::DataLake;
use crate::loader::IdempotentLoader;

/// Carga al raw store todo lo que haya en el lake.
pub struct LoadStage {
    lake: DataLake,
    loader: IdempotentLoader,
}

impl LoadStage {
    pub fn new(lake: DataLake, loader: IdempotentLoader) -> Self {
        Self { lake, loader }
    }
}

impl StageDefinition for LoadStage {
    fn id(&self) -> &str {
        RAW_RECORDS
    }

    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        let units = self.lake
                        .source_units()
                        .map_err(|e| StageError::failed(format!("cannot list source units: {e}")))?;
        let summary = self.loader.load_units(&units, &ctx.cancel);
        ctx.check_cancelled()?;
        if summary.source_units > 0 && summary.failed_units == summary.source_units {
            return Err(StageError::failed(format!("all {} source units failed", summary.source_units)));
        }
        Ok(StageReport::from_serialize(&summary))
    }
}
