//! Tipos de evento de un run y estructura `RunEvent`.
//!
//! Rol en el flujo:
//! - Cada `Scheduler::execute` emite eventos a un `RunEventStore`
//!   append-only: solicitud, transiciones de cada stage y cierre.
//! - El estado de un run (`RunInstance`) se reconstruye por replay de estos
//!   eventos; los runs históricos nunca se mutan.
//! - El historial completo alimenta la política de staleness.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::StageError;
use crate::repo::RunStatus;

/// Origen de un run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Disparo del reloj diario; `scheduled_for` es el instante nominal.
    Schedule { scheduled_for: DateTime<Utc> },
    /// Invocación a demanda (CLI, tests).
    Manual,
}

/// Motivo por el que un stage terminó `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Un upstream directo terminó `failed` o `skipped`.
    UpstreamNotSucceeded { upstream: String },
    /// El run se canceló antes de empezar este stage.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// Primer evento de un run. `stages` es la selección ya resuelta, en
    /// orden topológico.
    RunRequested {
        trigger: Trigger,
        selection: String,
        stages: Vec<String>,
        graph_hash: String,
        engine_version: String,
    },
    StageStarted { stage_id: String },
    StageSucceeded { stage_id: String, report: Value, duration_ms: u64 },
    StageFailed { stage_id: String, error: StageError, duration_ms: u64 },
    StageSkipped { stage_id: String, reason: SkipReason },
    /// Evento de cierre con el estado agregado.
    RunCompleted { status: RunStatus },
}

impl RunEventKind {
    /// Nombre estable en minúsculas (columna `event_type` del backend SQL).
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEventKind::RunRequested { .. } => "runrequested",
            RunEventKind::StageStarted { .. } => "stagestarted",
            RunEventKind::StageSucceeded { .. } => "stagesucceeded",
            RunEventKind::StageFailed { .. } => "stagefailed",
            RunEventKind::StageSkipped { .. } => "stageskipped",
            RunEventKind::RunCompleted { .. } => "runcompleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64, // orden total del store, también entre runs
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}
