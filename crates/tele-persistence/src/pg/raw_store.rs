use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::debug;
use serde_json::Value;
use tele_domain::{DerivedFact, Detection, FactInsertOutcome, IncomingRecord, RawRecord, RawStore, RecordId, StoreError};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{derived_facts, raw_records};

#[derive(Insertable, Debug)]
#[diesel(table_name = raw_records)]
struct NewRawRow<'a> {
    record_id: i64,
    source_channel: &'a str,
    payload: &'a Value,
    loaded_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
struct RawRow {
    record_id: i64,
    source_channel: String,
    payload: Value,
    loaded_at: DateTime<Utc>,
}

impl From<RawRow> for RawRecord {
    fn from(r: RawRow) -> Self {
        RawRecord { record_id: r.record_id,
                    source_channel: r.source_channel,
                    payload: r.payload,
                    loaded_at: r.loaded_at }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = derived_facts)]
struct NewFactRow<'a> {
    record_id: i64,
    fact_label: &'a str,
    confidence: f64,
    detected_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
struct FactRow {
    record_id: i64,
    fact_label: String,
    confidence: f64,
    detected_at: DateTime<Utc>,
}

impl From<FactRow> for DerivedFact {
    fn from(r: FactRow) -> Self {
        DerivedFact { record_id: r.record_id,
                      fact_label: r.fact_label,
                      confidence: r.confidence,
                      detected_at: r.detected_at }
    }
}

/// Raw store sobre Postgres.
///
/// La unicidad por `record_id` y por (`record_id`, `fact_label`) la impone la
/// base (PRIMARY KEY + `ON CONFLICT`), no un lock de la aplicación: loaders
/// concurrentes sobre el mismo id quedan serializados por Postgres.
pub struct PgRawStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgRawStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> RawStore for PgRawStore<P> {
    fn upsert_unit(&self, unit: &str, records: &[IncomingRecord], loaded_at: DateTime<Utc>) -> Result<usize, StoreError> {
        debug!("upsert_unit:start unit={unit} records={}", records.len());
        let applied = with_retry(|| {
                          let mut conn = self.provider.connection()?;
                          conn.build_transaction()
                              .read_write()
                              .run(|tx| {
                                  let mut applied = 0usize;
                                  // Fila a fila: un mismo id puede repetirse dentro de la unidad y
                                  // Postgres no admite dos updates de la misma fila por sentencia.
                                  for rec in records {
                                      applied += diesel::insert_into(raw_records::table)
                                          .values(NewRawRow { record_id: rec.record_id,
                                                              source_channel: &rec.source_channel,
                                                              payload: &rec.payload,
                                                              loaded_at })
                                          .on_conflict(raw_records::record_id)
                                          .do_update()
                                          .set((raw_records::payload.eq(excluded(raw_records::payload)),
                                                raw_records::loaded_at.eq(excluded(raw_records::loaded_at))))
                                          .execute(tx)?;
                                  }
                                  Ok::<usize, diesel::result::Error>(applied)
                              })
                              .map_err(PersistenceError::from)
                      })?;
        debug!("upsert_unit:done unit={unit} applied={applied}");
        Ok(applied)
    }

    fn insert_facts(&self,
                    record_id: RecordId,
                    detections: &[Detection],
                    detected_at: DateTime<Utc>)
                    -> Result<FactInsertOutcome, StoreError> {
        let outcome = with_retry(|| {
                          let mut conn = self.provider.connection()?;
                          conn.build_transaction()
                              .read_write()
                              .run(|tx| {
                                  let mut outcome = FactInsertOutcome::default();
                                  for d in detections {
                                      let inserted = diesel::insert_into(derived_facts::table)
                                          .values(NewFactRow { record_id,
                                                               fact_label: &d.label,
                                                               confidence: d.confidence,
                                                               detected_at })
                                          .on_conflict_do_nothing()
                                          .execute(tx)?;
                                      if inserted == 0 {
                                          outcome.duplicates += 1;
                                      } else {
                                          outcome.written += 1;
                                      }
                                  }
                                  Ok::<FactInsertOutcome, diesel::result::Error>(outcome)
                              })
                              .map_err(PersistenceError::from)
                      })?;
        debug!("insert_facts record_id={record_id} written={} duplicates={}",
               outcome.written,
               outcome.duplicates);
        Ok(outcome)
    }

    fn record(&self, record_id: RecordId) -> Result<Option<RawRecord>, StoreError> {
        let row: Option<RawRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      raw_records::table.find(record_id)
                                                        .first(&mut conn)
                                                        .optional()
                                                        .map_err(PersistenceError::from)
                                  })?;
        Ok(row.map(RawRecord::from))
    }

    fn records(&self) -> Result<Vec<RawRecord>, StoreError> {
        let rows: Vec<RawRow> = with_retry(|| {
                                    let mut conn = self.provider.connection()?;
                                    raw_records::table.order(raw_records::record_id.asc())
                                                      .load(&mut conn)
                                                      .map_err(PersistenceError::from)
                                })?;
        Ok(rows.into_iter().map(RawRecord::from).collect())
    }

    fn facts_for(&self, record_id: RecordId) -> Result<Vec<DerivedFact>, StoreError> {
        let rows: Vec<FactRow> = with_retry(|| {
                                     let mut conn = self.provider.connection()?;
                                     derived_facts::table.filter(derived_facts::record_id.eq(record_id))
                                                         .order(derived_facts::fact_label.asc())
                                                         .load(&mut conn)
                                                         .map_err(PersistenceError::from)
                                 })?;
        Ok(rows.into_iter().map(DerivedFact::from).collect())
    }

    fn facts(&self) -> Result<Vec<DerivedFact>, StoreError> {
        let rows: Vec<FactRow> = with_retry(|| {
                                     let mut conn = self.provider.connection()?;
                                     derived_facts::table.order((derived_facts::record_id.asc(),
                                                                 derived_facts::fact_label.asc()))
                                                         .load(&mut conn)
                                                         .map_err(PersistenceError::from)
                                 })?;
        Ok(rows.into_iter().map(DerivedFact::from).collect())
    }

    fn count_records(&self) -> Result<usize, StoreError> {
        let n: i64 = with_retry(|| {
                         let mut conn = self.provider.connection()?;
                         raw_records::table.count().get_result(&mut conn).map_err(PersistenceError::from)
                     })?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}
