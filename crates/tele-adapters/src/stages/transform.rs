use std::sync::Arc;

use log::{info, warn};
use serde_json::json;
use tele_core::{ExecutionContext, StageDefinition, StageError, StageKind, StageReport, StageRunResult};
use tele_domain::Transformer;

use super::ANALYTICS_MODELS;

/// Transformación analítica delegada a un `Transformer` externo.
pub struct TransformStage {
    transformer: Option<Arc<dyn Transformer>>,
}

impl TransformStage {
    pub fn new(transformer: Option<Arc<dyn Transformer>>) -> Self {
        Self { transformer }
    }
}

impl StageDefinition for TransformStage {
    fn id(&self) -> &str {
        ANALYTICS_MODELS
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        let Some(transformer) = &self.transformer else {
            warn!("no transformer configured; skipping analytics models");
            return Ok(StageReport::new(json!({ "skipped": "no transformer configured" })));
        };
        ctx.check_cancelled()?;
        let scripts = transformer.transform().map_err(|e| StageError::failed(e.to_string()))?;
        info!("analytics models refreshed ({scripts} scripts)");
        Ok(StageReport::new(json!({ "scripts_applied": scripts })))
    }
}

#[cfg(test)]
mod tests {
    use tele_domain::TransformError;

    use super::*;

    struct Scripts(Result<usize, TransformError>);

    impl Transformer for Scripts {
        fn transform(&self) -> Result<usize, TransformError> {
            self.0.clone()
        }
    }

    #[test]
    fn missing_transformer_is_skipped_not_failed() {
        let report = TransformStage::new(None).run(&ExecutionContext::detached(ANALYTICS_MODELS)).expect("run");
        assert_eq!(report.summary["skipped"], "no transformer configured");
    }

    #[test]
    fn transformer_errors_fail_the_stage() {
        let ok = TransformStage::new(Some(Arc::new(Scripts(Ok(3)))));
        let report = ok.run(&ExecutionContext::detached(ANALYTICS_MODELS)).expect("run");
        assert_eq!(report.summary["scripts_applied"], 3);

        let broken = TransformStage::new(Some(Arc::new(Scripts(Err(TransformError::Io("no dir".into()))))));
        let err = broken.run(&ExecutionContext::detached(ANALYTICS_MODELS)).unwrap_err();
        assert!(matches!(err, StageError::Failed(_)), "{err:?}");
    }
}
