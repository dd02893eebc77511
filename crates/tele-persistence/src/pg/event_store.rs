use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, error};
use serde_json::Value;
use tele_core::errors::{classify_error, AuditError};
use tele_core::{RunEvent, RunEventKind, RunEventStore};
use uuid::Uuid;

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{pipeline_run_events, stage_execution_errors};

/// Fila de `pipeline_run_events`. `payload` es el JSON completo de
/// `RunEventKind`; `event_type` es la pista en minúsculas usada por el CHECK.
#[derive(Queryable, Debug)]
struct EventRow {
    seq: i64,
    run_id: Uuid,
    ts: DateTime<Utc>,
    #[allow(dead_code)]
    event_type: String,
    payload: Value,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = pipeline_run_events)]
struct NewEventRow<'a> {
    run_id: &'a Uuid,
    event_type: &'a str,
    payload: &'a Value,
}

/// Fila de `stage_execution_errors` para lecturas.
#[derive(Queryable, Debug)]
pub struct ErrorRow {
    pub id: i64,
    pub run_id: Uuid,
    pub stage_id: String,
    pub error_class: String,
    pub details: Option<Value>,
    pub ts: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = stage_execution_errors)]
struct NewErrorRow<'a> {
    run_id: &'a Uuid,
    stage_id: &'a str,
    error_class: &'a str,
    details: Option<&'a Value>,
}

fn to_event(row: EventRow) -> Result<RunEvent, PersistenceError> {
    let kind: RunEventKind = serde_json::from_value(row.payload)?;
    Ok(RunEvent { seq: u64::try_from(row.seq).unwrap_or_default(),
                  run_id: row.run_id,
                  kind,
                  ts: row.ts })
}

fn to_events(rows: Vec<EventRow>) -> Result<Vec<RunEvent>, PersistenceError> {
    rows.into_iter().map(to_event).collect()
}

/// Audit trail de runs sobre Postgres (append-only).
pub struct PgRunEventStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgRunEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Errores de stage registrados para un run, ordenados por `ts`.
    pub fn list_errors(&self, run_id: Uuid) -> Result<Vec<ErrorRow>, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            stage_execution_errors::table.filter(stage_execution_errors::run_id.eq(run_id))
                                         .order(stage_execution_errors::ts.asc())
                                         .load(&mut conn)
                                         .map_err(PersistenceError::from)
        })
    }
}

impl<P: ConnectionProvider> RunEventStore for PgRunEventStore<P> {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> Result<RunEvent, AuditError> {
        let event_type = kind.event_type();
        debug!("append_kind:start run_id={run_id} kind={event_type}");
        let payload = serde_json::to_value(&kind).map_err(PersistenceError::from)?;
        let failure = match &kind {
            RunEventKind::StageFailed { stage_id, error, .. } => {
                Some((stage_id.as_str(), classify_error(error).as_str(), serde_json::to_value(error).ok()))
            }
            _ => None,
        };

        // Evento y fila de error en la misma transacción.
        let (seq, ts): (i64, DateTime<Utc>) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    let inserted: (i64, DateTime<Utc>) = diesel::insert_into(pipeline_run_events::table)
                        .values(NewEventRow { run_id: &run_id,
                                              event_type,
                                              payload: &payload })
                        .returning((pipeline_run_events::seq, pipeline_run_events::ts))
                        .get_result(tx)?;
                    if let Some((stage_id, error_class, details)) = &failure {
                        diesel::insert_into(stage_execution_errors::table)
                            .values(NewErrorRow { run_id: &run_id,
                                                  stage_id,
                                                  error_class,
                                                  details: details.as_ref() })
                            .execute(tx)?;
                    }
                    Ok::<(i64, DateTime<Utc>), diesel::result::Error>(inserted)
                })
                .map_err(PersistenceError::from)
        }).map_err(|e| {
              error!("append_kind:error run_id={run_id} kind={event_type} err={e:?}");
              AuditError::from(e)
          })?;

        debug!("append_kind:done run_id={run_id} seq={seq}");
        Ok(RunEvent { seq: u64::try_from(seq).unwrap_or_default(),
                      run_id,
                      kind,
                      ts })
    }

    fn list(&self, run_id: Uuid) -> Result<Vec<RunEvent>, AuditError> {
        let rows: Vec<EventRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      pipeline_run_events::table.filter(pipeline_run_events::run_id.eq(run_id))
                                                                .order(pipeline_run_events::seq.asc())
                                                                .load(&mut conn)
                                                                .map_err(PersistenceError::from)
                                  })?;
        Ok(to_events(rows)?)
    }

    fn history(&self) -> Result<Vec<RunEvent>, AuditError> {
        let rows: Vec<EventRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      pipeline_run_events::table.order(pipeline_run_events::seq.asc())
                                                                .load(&mut conn)
                                                                .map_err(PersistenceError::from)
                                  })?;
        Ok(to_events(rows)?)
    }
}
