use serde::{Deserialize, Serialize};

use super::run_result::StageRunResult;
use crate::engine::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Extraction,
    Load,
    Transform,
    Enrichment,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Extraction => "extraction",
            StageKind::Load => "load",
            StageKind::Transform => "transform",
            StageKind::Enrichment => "enrichment",
        }
    }
}

/// Trait que define un Stage.
///
/// `run` se invoca en un hilo propio (ver `Scheduler`), por eso el trait
/// exige `Send + Sync`. Un stage debe dejar el store en un estado válido si
/// se interrumpe entre unidades: cada unidad confirma o revierte completa.
pub trait StageDefinition: Send + Sync {
    /// Identificador estable y único dentro del grafo.
    fn id(&self) -> &str;

    /// Tipo general del stage.
    fn kind(&self) -> StageKind;

    /// Ejecución del stage. Los errores se devuelven, nunca se propagan como
    /// panic (si ocurre, el scheduler lo registra como `StageError::Panicked`).
    fn run(&self, ctx: &ExecutionContext) -> StageRunResult;
}
