use std::fmt;

use super::{StageDefinition, StageKind, StageRunResult};
use crate::engine::ExecutionContext;

type StageFn = dyn Fn(&ExecutionContext) -> StageRunResult + Send + Sync;

/// Stage cuyo cuerpo es una closure. Útil para stages triviales y tests.
pub struct FnStage {
    id: String,
    kind: StageKind,
    body: Box<StageFn>,
}

impl FnStage {
    pub fn new<F>(id: impl Into<String>, kind: StageKind, body: F) -> Self
        where F: Fn(&ExecutionContext) -> StageRunResult + Send + Sync + 'static
    {
        Self { id: id.into(),
               kind,
               body: Box::new(body) }
    }
}

impl fmt::Debug for FnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).field("kind", &self.kind).finish()
    }
}

impl StageDefinition for FnStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        (self.body)(ctx)
    }
}
