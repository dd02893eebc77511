use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StageError;

/// Resumen opaco que un stage entrega al terminar (conteos, rutas, etc.).
/// Se guarda tal cual en el evento `StageSucceeded`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageReport {
    pub summary: Value,
}

impl StageReport {
    pub fn empty() -> Self {
        Self { summary: Value::Null }
    }

    pub fn new(summary: Value) -> Self {
        Self { summary }
    }

    /// Serializa cualquier resumen tipado (`LoadSummary`, ...).
    pub fn from_serialize<T: Serialize>(summary: &T) -> Self {
        Self { summary: serde_json::to_value(summary).unwrap_or(Value::Null) }
    }
}

/// Resultado de ejecutar un stage.
pub type StageRunResult = Result<StageReport, StageError>;
