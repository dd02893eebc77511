//! Idempotent Loader: merge de unidades de origen al raw store.
//!
//! - Las unidades (archivos) se leen, decodifican y validan en el pool de
//!   workers, de a chunks de `concurrency`.
//! - Los commits se hacen de a uno, en el orden del lake (fecha, canal): si un
//!   mismo id aparece en varias particiones gana la más reciente.
//! - Una unidad se confirma completa o no se confirma (`TransactionError`);
//!   un registro sin id válido se cuenta como `skipped_invalid` y no aborta
//!   la unidad.
use std::fs;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use tele_core::CancelToken;
use tele_domain::{IncomingRecord, LoadSummary, RawStore, TransactionError};

use crate::lake::SourceUnit;
use crate::pool::worker_pool;

/// Unidad ya validada, pendiente de commit.
#[derive(Debug)]
struct ParsedUnit {
    label: String,
    records: Vec<IncomingRecord>,
    processed: usize,
    skipped_invalid: usize,
}

fn validate(label: &str, channel: &str, messages: Vec<Value>) -> ParsedUnit {
    let processed = messages.len();
    let mut records = Vec::with_capacity(processed);
    let mut skipped_invalid = 0;
    for (pos, message) in messages.into_iter().enumerate() {
        match IncomingRecord::from_message(channel, message) {
            Ok(rec) => records.push(rec),
            Err(e) => {
                warn!("{label}: skipping message #{pos}: {e}");
                skipped_invalid += 1;
            }
        }
    }
    ParsedUnit { label: label.to_string(),
                 records,
                 processed,
                 skipped_invalid }
}

fn parse_unit(unit: &SourceUnit) -> Result<ParsedUnit, TransactionError> {
    let label = unit.label();
    let bytes = fs::read(&unit.path).map_err(|source| TransactionError::Read { unit: label.clone(), source })?;
    let doc: Value = serde_json::from_slice(&bytes).map_err(|e| TransactionError::Malformed { unit: label.clone(),
                                                                                             reason: e.to_string() })?;
    let Value::Array(messages) = doc else {
        return Err(TransactionError::Malformed { unit: label,
                                                 reason: "expected a JSON array of messages".into() });
    };
    Ok(validate(&label, &unit.channel, messages))
}

pub struct IdempotentLoader {
    store: Arc<dyn RawStore>,
    concurrency: usize,
}

impl IdempotentLoader {
    pub fn new(store: Arc<dyn RawStore>, concurrency: usize) -> Self {
        Self { store,
               concurrency: concurrency.max(1) }
    }

    pub fn store(&self) -> &Arc<dyn RawStore> {
        &self.store
    }

    fn commit(&self, parsed: &ParsedUnit) -> Result<usize, TransactionError> {
        self.store
            .upsert_unit(&parsed.label, &parsed.records, Utc::now())
            .map_err(|source| TransactionError::Store { unit: parsed.label.clone(),
                                                        source })
    }

    /// Carga un lote ya decodificado como una única unidad de origen.
    pub fn load_batch(&self, unit: &str, channel: &str, messages: Vec<Value>) -> Result<LoadSummary, TransactionError> {
        let parsed = validate(unit, channel, messages);
        let upserted = self.commit(&parsed)?;
        Ok(LoadSummary { processed: parsed.processed,
                         upserted,
                         skipped_invalid: parsed.skipped_invalid,
                         source_units: 1,
                         failed_units: 0 })
    }

    /// Confirma, en orden, las unidades de un chunk ya parseado.
    fn commit_chunk(&self, parsed: Vec<Result<ParsedUnit, TransactionError>>, cancel: &CancelToken) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for result in parsed {
            let unit = match result {
                Ok(unit) => unit,
                Err(e) => {
                    error!("{e}");
                    summary.failed_units += 1;
                    continue;
                }
            };
            summary.processed += unit.processed;
            summary.skipped_invalid += unit.skipped_invalid;
            if cancel.is_cancelled() {
                info!("{}", TransactionError::Cancelled { unit: unit.label });
                continue;
            }
            match self.commit(&unit) {
                Ok(n) => {
                    info!("{}: upserted {n} messages ({} skipped)", unit.label, unit.skipped_invalid);
                    summary.upserted += n;
                }
                Err(e) => {
                    error!("{e}");
                    summary.failed_units += 1;
                }
            }
        }
        summary
    }

    /// Carga todas las unidades en chunks de `concurrency`: cada chunk se
    /// parsea en paralelo y se confirma antes de leer el siguiente, así en
    /// memoria nunca hay más de un chunk decodificado. Las unidades que
    /// fallan se revierten y se cuentan en `failed_units`; el resto continúa.
    /// Tras una cancelación no se inicia ningún commit ni parseo más.
    pub fn load_units(&self, units: &[SourceUnit], cancel: &CancelToken) -> LoadSummary {
        let mut summary = LoadSummary { source_units: units.len(),
                                        ..LoadSummary::default() };
        if units.is_empty() {
            return summary;
        }

        let pool = worker_pool("tele-load", self.concurrency).map_err(|e| warn!("worker pool unavailable ({e}); parsing sequentially"))
                                                             .ok();
        for (i, chunk) in units.chunks(self.concurrency).enumerate() {
            if cancel.is_cancelled() {
                info!("load cancelled; {} units left unread", units.len() - i * self.concurrency);
                break;
            }
            let parsed: Vec<Result<ParsedUnit, TransactionError>> = match &pool {
                Some(pool) => pool.install(|| chunk.par_iter().map(parse_unit).collect()),
                None => chunk.iter().map(parse_unit).collect(),
            };
            summary.merge(&self.commit_chunk(parsed, cancel));
        }
        info!("load complete: {} units ({} failed), {} upserted, {} invalid",
              summary.source_units,
              summary.failed_units,
              summary.upserted,
              summary.skipped_invalid);
        summary
    }
}
