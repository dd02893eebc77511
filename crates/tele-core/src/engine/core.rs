//! Scheduler: ejecuta una selección del grafo de stages como un run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use uuid::Uuid;

use super::context::{CancelToken, ExecutionContext};
use super::staleness;
use crate::constants::{ENGINE_VERSION, STAGE_THREAD_PREFIX, TIMEOUT_GRACE_SECS};
use crate::errors::{EngineError, StageError};
use crate::event::{run_ids, InMemoryRunEventStore, RunEvent, RunEventKind, RunEventStore, SkipReason, Trigger};
use crate::graph::{Selection, StageGraph};
use crate::repo::{InMemoryRunRepository, RunRepository, RunResult, RunStatus};
use crate::stage::{StageDefinition, StageReport, StageRunResult, StageStatus};

type StageOutput = thread::Result<StageRunResult>;

/// Hilo de un stage que excedió su timeout y no terminó dentro del período
/// de gracia.
struct Lingering {
    stage_id: String,
    rx: Receiver<StageOutput>,
}

/// Motor de ejecución de runs sobre un `StageGraph` validado.
///
/// Los stages se ejecutan de a uno, en orden topológico. Cada cuerpo corre
/// en un hilo propio para poder acotarlo con un timeout y aislar panics; el
/// scheduler espera su resultado antes de pasar al siguiente stage.
///
/// Dos stages nunca corren a la vez: si un stage excede su timeout se cancela
/// su token y se espera su hilo durante un período de gracia. Mientras ese
/// hilo siga vivo, el resto del run (y los runs siguientes) se omiten con
/// `SkipReason::Cancelled`.
///
/// Todo cambio de estado se registra primero en el `RunEventStore` y el
/// estado del run se obtiene por replay (`RunRepository::load`).
pub struct Scheduler<E = InMemoryRunEventStore, R = InMemoryRunRepository>
    where E: RunEventStore,
          R: RunRepository
{
    graph: StageGraph,
    event_store: E,
    repository: R,
    stage_timeout: Option<Duration>,
    timeout_grace: Duration,
    lingering: Option<Lingering>,
}

impl Scheduler<InMemoryRunEventStore, InMemoryRunRepository> {
    /// Scheduler con audit trail en memoria.
    pub fn new(graph: StageGraph) -> Self {
        Self::with_stores(graph, InMemoryRunEventStore::new(), InMemoryRunRepository::new())
    }
}

impl<E, R> Scheduler<E, R>
    where E: RunEventStore,
          R: RunRepository
{
    pub fn with_stores(graph: StageGraph, event_store: E, repository: R) -> Self {
        Self { graph,
               event_store,
               repository,
               stage_timeout: None,
               timeout_grace: Duration::from_secs(TIMEOUT_GRACE_SECS),
               lingering: None }
    }

    /// Techo de wall-clock por stage. `None` (o duración cero) lo desactiva.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    /// Espera máxima por el hilo de un stage cancelado por timeout.
    pub fn with_timeout_grace(mut self, grace: Duration) -> Self {
        self.timeout_grace = grace;
        self
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    /// Ejecuta la selección como run manual.
    pub fn execute(&mut self, selection: &Selection) -> Result<RunResult, EngineError> {
        self.execute_with(selection, Trigger::Manual, &CancelToken::new())
    }

    /// Ejecuta la selección con el trigger y el token de cancelación dados.
    ///
    /// Una selección inválida falla antes de escribir ningún evento. Los
    /// fallos de stage nunca se devuelven como `Err`: quedan en el
    /// `RunResult`.
    pub fn execute_with(&mut self,
                        selection: &Selection,
                        trigger: Trigger,
                        cancel: &CancelToken)
                        -> Result<RunResult, EngineError> {
        let history = match selection {
            Selection::Stale => self.event_store.history()?,
            _ => Vec::new(),
        };
        let chosen = self.graph.resolve(selection, &history)?;
        let stage_ids: Vec<String> = chosen.iter().map(|&i| self.graph.node(i).definition.id().to_string()).collect();

        let run_id = Uuid::new_v4();
        let requested = self.event_store.append_kind(run_id,
                                                     RunEventKind::RunRequested { trigger,
                                                                                  selection: selection.to_string(),
                                                                                  stages: stage_ids.clone(),
                                                                                  graph_hash: self.graph
                                                                                                  .graph_hash()
                                                                                                  .to_string(),
                                                                                  engine_version: ENGINE_VERSION.to_string() })?;
        let requested_at = requested.ts;
        let mut events = vec![requested];
        info!("run {run_id} requested: selection={selection} stages={stage_ids:?}");
        let mut stuck = self.settle_lingering();

        for &idx in &chosen {
            let definition = Arc::clone(&self.graph.node(idx).definition);
            let upstream: Vec<String> = self.graph.upstream_ids(idx).into_iter().map(str::to_string).collect();
            let stage_id = definition.id().to_string();

            if stuck.is_some() || cancel.is_cancelled() {
                match &stuck {
                    Some(busy) => warn!("run {run_id}: skipping '{stage_id}' (timed-out stage '{busy}' is still running)"),
                    None => debug!("run {run_id}: skipping '{stage_id}' (run cancelled)"),
                }
                self.append(run_id,
                            RunEventKind::StageSkipped { stage_id,
                                                         reason: SkipReason::Cancelled },
                            &mut events)?;
                continue;
            }

            // Los upstream fuera de la selección no aparecen en la instancia:
            // se consideran satisfechos por runs anteriores.
            let instance = self.repository.load(run_id, &events);
            let blocked = upstream.into_iter()
                                  .find(|up| instance.status_of(up).is_some_and(|s| s != StageStatus::Succeeded));
            if let Some(upstream) = blocked {
                info!("run {run_id}: skipping '{stage_id}' (upstream '{upstream}' did not succeed)");
                self.append(run_id,
                            RunEventKind::StageSkipped { stage_id,
                                                         reason: SkipReason::UpstreamNotSucceeded { upstream } },
                            &mut events)?;
                continue;
            }

            self.append(run_id, RunEventKind::StageStarted { stage_id: stage_id.clone() }, &mut events)?;
            info!("run {run_id}: stage '{stage_id}' started");
            let ctx = ExecutionContext { run_id,
                                         stage_id: stage_id.clone(),
                                         requested_at,
                                         cancel: cancel.child() };
            let started = Instant::now();
            let (outcome, still_running) = self.invoke(definition, ctx);
            if let Some(rx) = still_running {
                stuck = Some(stage_id.clone());
                self.lingering = Some(Lingering { stage_id: stage_id.clone(),
                                                  rx });
            }
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let kind = match outcome {
                Ok(report) => {
                    info!("run {run_id}: stage '{stage_id}' succeeded in {duration_ms} ms");
                    RunEventKind::StageSucceeded { stage_id,
                                                   report: report.summary,
                                                   duration_ms }
                }
                Err(error) => {
                    warn!("run {run_id}: stage '{stage_id}' failed after {duration_ms} ms: {error}");
                    RunEventKind::StageFailed { stage_id,
                                                error,
                                                duration_ms }
                }
            };
            self.append(run_id, kind, &mut events)?;
        }

        let instance = self.repository.load(run_id, &events);
        let status = RunStatus::from_statuses(instance.stages.iter().map(|s| s.status));
        self.append(run_id, RunEventKind::RunCompleted { status }, &mut events)?;
        info!("run {run_id} completed: {status}");

        self.repository
            .load(run_id, &events)
            .into_result()
            .ok_or(EngineError::RunNotFound(run_id))
    }

    fn append(&mut self, run_id: Uuid, kind: RunEventKind, events: &mut Vec<RunEvent>) -> Result<(), EngineError> {
        let ev = self.event_store.append_kind(run_id, kind)?;
        events.push(ev);
        Ok(())
    }

    /// Corre el cuerpo del stage en un hilo nombrado y espera su resultado
    /// (con timeout si está configurado). Un panic se traduce a
    /// `StageError::Panicked`.
    ///
    /// Tras un timeout se cancela el token del stage y se espera su hilo hasta
    /// `timeout_grace`; si sigue vivo se devuelve su receptor.
    fn invoke(&self, stage: Arc<dyn StageDefinition>, ctx: ExecutionContext)
              -> (Result<StageReport, StageError>, Option<Receiver<StageOutput>>) {
        let stage_token = ctx.cancel.clone();
        let thread_name = format!("{STAGE_THREAD_PREFIX}{}", ctx.stage_id);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| stage.run(&ctx)));
            // El receptor puede haber abandonado por timeout.
            let _ = tx.send(result);
        });
        if let Err(e) = spawned {
            return (Err(StageError::failed(format!("could not spawn stage thread: {e}"))), None);
        }

        let received = match self.stage_timeout {
            Some(limit) => rx.recv_timeout(limit),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(output) => (stage_outcome(output), None),
            Err(RecvTimeoutError::Timeout) => {
                stage_token.cancel();
                let after_secs = self.stage_timeout.map(|d| d.as_secs()).unwrap_or_default();
                let still_running = match rx.recv_timeout(self.timeout_grace) {
                    Err(RecvTimeoutError::Timeout) => Some(rx),
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => None,
                };
                (Err(StageError::Timeout { after_secs }), still_running)
            }
            Err(RecvTimeoutError::Disconnected) => {
                (Err(StageError::Panicked("stage thread exited without a result".into())), None)
            }
        }
    }

    /// Espera (hasta `timeout_grace`) al hilo de un run anterior que excedió
    /// su timeout. Devuelve el id del stage si todavía sigue corriendo.
    fn settle_lingering(&mut self) -> Option<String> {
        let lingering = self.lingering.take()?;
        match lingering.rx.recv_timeout(self.timeout_grace) {
            Err(RecvTimeoutError::Timeout) => {
                let stage_id = lingering.stage_id.clone();
                self.lingering = Some(lingering);
                Some(stage_id)
            }
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                info!("timed-out stage '{}' has finished", lingering.stage_id);
                None
            }
        }
    }

    /// Stages stale según el historial completo.
    pub fn stale_stages(&self) -> Result<Vec<String>, EngineError> {
        let history = self.event_store.history()?;
        Ok(staleness::stale_stages(&self.graph, &history))
    }

    /// Reporte de un run pasado, reconstruido desde el audit trail.
    pub fn run_report(&self, run_id: Uuid) -> Result<RunResult, EngineError> {
        let events = self.event_store.list(run_id)?;
        self.repository
            .load(run_id, &events)
            .into_result()
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Todos los runs registrados, en orden de solicitud.
    pub fn runs(&self) -> Result<Vec<RunResult>, EngineError> {
        let history = self.event_store.history()?;
        Ok(run_ids(&history).into_iter()
                            .filter_map(|id| self.repository.load(id, &history).into_result())
                            .collect())
    }
}

fn stage_outcome(output: StageOutput) -> Result<StageReport, StageError> {
    match output {
        Ok(result) => result,
        Err(payload) => Err(StageError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
