//! Errores del core: construcción del grafo, ejecución de runs y fallos de
//! stage.
//!
//! - `GraphError` es fatal y sólo aparece al construir el grafo (arranque).
//! - `EngineError` aborta una invocación de `Scheduler::execute` antes de que
//!   corra ningún stage (selección inválida) o cuando el audit trail no acepta
//!   escrituras.
//! - `StageError` es el payload de un `StageFailure`: queda registrado en el
//!   audit trail y nunca escapa del scheduler como crash del proceso.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errores de construcción del grafo de stages.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GraphError {
    /// `GraphCycleError`: la relación upstream contiene un ciclo que pasa por
    /// `stage`.
    #[error("graph cycle detected at stage '{stage}'")]
    Cycle { stage: String },
    #[error("stage '{0}' declared more than once")]
    DuplicateStage(String),
    #[error("stage '{stage}' depends on unknown stage '{upstream}'")]
    UnknownUpstream { stage: String, upstream: String },
    #[error("stage id must not be empty")]
    EmptyStageId,
}

/// Errores que impiden ejecutar (o auditar) un run.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),
    #[error("selection names no stage")]
    EmptySelection,
    #[error("run {0} not found in audit trail")]
    RunNotFound(uuid::Uuid),
    #[error("audit trail error: {0}")]
    Audit(#[from] AuditError),
}

/// Fallo al escribir/leer el audit trail de runs.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[error("{0}")]
pub struct AuditError(pub String);

/// Error producido por el cuerpo de un stage (o por el scheduler al
/// supervisarlo).
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum StageError {
    #[error("stage failed: {0}")]
    Failed(String),
    #[error("stage exceeded its {after_secs}s wall-clock ceiling")]
    Timeout { after_secs: u64 },
    #[error("stage cancelled before completion")]
    Cancelled,
    #[error("stage panicked: {0}")]
    Panicked(String),
    #[error("stage misconfigured: {0}")]
    Misconfigured(String),
}

impl StageError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Clasificación gruesa de errores de stage para el audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Runtime,
    Validation,
    Transient,
    Permanent,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Runtime => "runtime",
            ErrorClass::Validation => "validation",
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
        }
    }
}

pub fn classify_error(err: &StageError) -> ErrorClass {
    match err {
        StageError::Failed(_) => ErrorClass::Runtime,
        StageError::Timeout { .. } | StageError::Cancelled => ErrorClass::Transient,
        StageError::Panicked(_) => ErrorClass::Permanent,
        StageError::Misconfigured(_) => ErrorClass::Validation,
    }
}
