//! Estado reconstruido de un run (`RunInstance`) y su reporte (`RunResult`).
//!
//! El repositorio aplica un replay lineal: consume los eventos del run en
//! orden y actualiza un slot por stage. No hay otro estado mutable: el reporte
//! de un run pasado se obtiene re-aplicando sus eventos.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::StageError;
use crate::event::{RunEvent, RunEventKind, SkipReason, Trigger};
use crate::stage::StageStatus;

/// Estado agregado de un run terminado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Todos los stages seleccionados terminaron `succeeded`.
    Succeeded,
    /// Al menos un stage terminó `failed`.
    Failed,
    /// Ningún fallo, pero algún stage quedó `skipped` (p.ej. cancelación).
    Partial,
}

impl RunStatus {
    pub fn from_statuses<I: IntoIterator<Item = StageStatus>>(statuses: I) -> Self {
        let mut any_failed = false;
        let mut all_ok = true;
        for s in statuses {
            match s {
                StageStatus::Succeeded => {}
                StageStatus::Failed => {
                    any_failed = true;
                    all_ok = false;
                }
                _ => all_ok = false,
            }
        }
        if all_ok {
            RunStatus::Succeeded
        } else if any_failed {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado de un stage en la instancia.
#[derive(Debug, Clone)]
pub struct StageSlot {
    pub stage_id: String,
    pub status: StageStatus,
    pub error: Option<StageError>,
    pub skip_reason: Option<SkipReason>,
    pub report: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl StageSlot {
    fn pending(stage_id: &str) -> Self {
        Self { stage_id: stage_id.to_string(),
               status: StageStatus::Pending,
               error: None,
               skip_reason: None,
               report: None,
               started_at: None,
               finished_at: None,
               duration_ms: None }
    }
}

pub struct RunInstance {
    pub id: Uuid,
    pub trigger: Option<Trigger>,
    pub selection: String,
    pub requested_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageSlot>,
    pub status: Option<RunStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunInstance {
    pub fn slot(&self, stage_id: &str) -> Option<&StageSlot> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn status_of(&self, stage_id: &str) -> Option<StageStatus> {
        self.slot(stage_id).map(|s| s.status)
    }

    /// Reporte del run. `None` si el run no tiene `RunRequested`.
    pub fn into_result(self) -> Option<RunResult> {
        let requested_at = self.requested_at?;
        let trigger = self.trigger?;
        let status = self.status
                         .unwrap_or_else(|| RunStatus::from_statuses(self.stages.iter().map(|s| s.status)));
        let stages = self.stages
                         .into_iter()
                         .map(|s| StageOutcome { stage_id: s.stage_id,
                                                 status: s.status,
                                                 error: s.error,
                                                 skip_reason: s.skip_reason,
                                                 report: s.report,
                                                 started_at: s.started_at,
                                                 finished_at: s.finished_at,
                                                 duration_ms: s.duration_ms })
                         .collect();
        Some(RunResult { run_id: self.id,
                         trigger,
                         selection: self.selection,
                         requested_at,
                         finished_at: self.completed_at,
                         completed: self.status.is_some(),
                         status,
                         stages })
    }
}

/// Trait para reconstruir (`replay`) el estado de un run a partir de eventos.
pub trait RunRepository {
    fn load(&self, run_id: Uuid, events: &[RunEvent]) -> RunInstance;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryRunRepository;

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self
    }
}

impl RunRepository for InMemoryRunRepository {
    fn load(&self, run_id: Uuid, events: &[RunEvent]) -> RunInstance {
        let mut instance = RunInstance { id: run_id,
                                         trigger: None,
                                         selection: String::new(),
                                         requested_at: None,
                                         stages: Vec::new(),
                                         status: None,
                                         completed_at: None };
        for ev in events.iter().filter(|e| e.run_id == run_id) {
            match &ev.kind {
                RunEventKind::RunRequested { trigger, selection, stages, .. } => {
                    instance.trigger = Some(trigger.clone());
                    instance.selection = selection.clone();
                    instance.requested_at = Some(ev.ts);
                    instance.stages = stages.iter().map(|s| StageSlot::pending(s)).collect();
                }
                RunEventKind::StageStarted { stage_id } => {
                    if let Some(slot) = slot_mut(&mut instance, stage_id) {
                        slot.status = StageStatus::Running;
                        slot.started_at = Some(ev.ts);
                    }
                }
                RunEventKind::StageSucceeded { stage_id, report, duration_ms } => {
                    if let Some(slot) = slot_mut(&mut instance, stage_id) {
                        slot.status = StageStatus::Succeeded;
                        slot.report = Some(report.clone());
                        slot.finished_at = Some(ev.ts);
                        slot.duration_ms = Some(*duration_ms);
                    }
                }
                RunEventKind::StageFailed { stage_id, error, duration_ms } => {
                    if let Some(slot) = slot_mut(&mut instance, stage_id) {
                        slot.status = StageStatus::Failed;
                        slot.error = Some(error.clone());
                        slot.finished_at = Some(ev.ts);
                        slot.duration_ms = Some(*duration_ms);
                    }
                }
                RunEventKind::StageSkipped { stage_id, reason } => {
                    if let Some(slot) = slot_mut(&mut instance, stage_id) {
                        slot.status = StageStatus::Skipped;
                        slot.skip_reason = Some(reason.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                }
                RunEventKind::RunCompleted { status } => {
                    instance.status = Some(*status);
                    instance.completed_at = Some(ev.ts);
                }
            }
        }
        instance
    }
}

fn slot_mut<'a>(instance: &'a mut RunInstance, stage_id: &str) -> Option<&'a mut StageSlot> {
    instance.stages.iter_mut().find(|s| s.stage_id == stage_id)
}

/// Resultado final de un stage dentro de un run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage_id: String,
    pub status: StageStatus,
    pub error: Option<StageError>,
    pub skip_reason: Option<SkipReason>,
    pub report: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

/// Reporte de un run: estado final de cada stage seleccionado y estado
/// agregado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub selection: String,
    pub requested_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `false` si el audit trail no tiene `RunCompleted` (proceso interrumpido).
    pub completed: bool,
    pub status: RunStatus,
    pub stages: Vec<StageOutcome>,
}

impl RunResult {
    pub fn stage(&self, stage_id: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn status_of(&self, stage_id: &str) -> Option<StageStatus> {
        self.stage(stage_id).map(|s| s.status)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f,
                 "run {} [{}] selection={} requested_at={}",
                 self.run_id,
                 self.status,
                 self.selection,
                 self.requested_at.to_rfc3339())?;
        for s in &self.stages {
            write!(f, "  {:<24} {}", s.stage_id, s.status)?;
            if let Some(ms) = s.duration_ms {
                write!(f, " ({ms} ms)")?;
            }
            if let Some(err) = &s.error {
                write!(f, " error: {err}")?;
            }
            match &s.skip_reason {
                Some(SkipReason::UpstreamNotSucceeded { upstream }) => write!(f, " (upstream '{upstream}' did not succeed)")?,
                Some(SkipReason::Cancelled) => write!(f, " (run cancelled)")?,
                None => {}
            }
            writeln!(f)?;
        }
        if !self.completed {
            writeln!(f, "  (run did not record completion)")?;
        }
        Ok(())
    }
}
