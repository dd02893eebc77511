//! Contrato del raw store y su implementación en memoria.
//!
//! Los únicos escritores son el loader (`upsert_unit`) y el merger de
//! enriquecimiento (`insert_facts`); el resto es lectura.
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::fact::{DerivedFact, Detection};
use crate::record::{IncomingRecord, RawRecord, RecordId};

/// Resultado de insertar los hechos de un artefacto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactInsertOutcome {
    pub written: usize,
    /// Hechos cuyo par (record_id, label) ya existía: se ignoran.
    pub duplicates: usize,
}

pub trait RawStore: Send + Sync {
    /// Upsert atómico de una unidad de origen completa: o se confirman todos
    /// los registros o ninguno. En conflicto sobre `record_id` se
    /// sobreescriben `payload` y `loaded_at`; `source_channel` se conserva.
    /// Devuelve la cantidad de upserts aplicados.
    fn upsert_unit(&self, unit: &str, records: &[IncomingRecord], loaded_at: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Inserta los hechos de un artefacto en una transacción. Un par
    /// existente no se toca (la primera escritura gana).
    fn insert_facts(&self,
                    record_id: RecordId,
                    detections: &[Detection],
                    detected_at: DateTime<Utc>)
                    -> Result<FactInsertOutcome, StoreError>;

    fn record(&self, record_id: RecordId) -> Result<Option<RawRecord>, StoreError>;

    /// Todos los registros, ordenados por `record_id`.
    fn records(&self) -> Result<Vec<RawRecord>, StoreError>;

    fn facts_for(&self, record_id: RecordId) -> Result<Vec<DerivedFact>, StoreError>;

    /// Todos los hechos, ordenados por (`record_id`, `fact_label`).
    fn facts(&self) -> Result<Vec<DerivedFact>, StoreError>;

    fn count_records(&self) -> Result<usize, StoreError> {
        Ok(self.records()?.len())
    }
}

impl<T: RawStore + ?Sized> RawStore for Arc<T> {
    fn upsert_unit(&self, unit: &str, records: &[IncomingRecord], loaded_at: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).upsert_unit(unit, records, loaded_at)
    }
    fn insert_facts(&self,
                    record_id: RecordId,
                    detections: &[Detection],
                    detected_at: DateTime<Utc>)
                    -> Result<FactInsertOutcome, StoreError> {
        (**self).insert_facts(record_id, detections, detected_at)
    }
    fn record(&self, record_id: RecordId) -> Result<Option<RawRecord>, StoreError> {
        (**self).record(record_id)
    }
    fn records(&self) -> Result<Vec<RawRecord>, StoreError> {
        (**self).records()
    }
    fn facts_for(&self, record_id: RecordId) -> Result<Vec<DerivedFact>, StoreError> {
        (**self).facts_for(record_id)
    }
    fn facts(&self) -> Result<Vec<DerivedFact>, StoreError> {
        (**self).facts()
    }
    fn count_records(&self) -> Result<usize, StoreError> {
        (**self).count_records()
    }
}

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<RecordId, RawRecord>,
    facts: BTreeMap<(RecordId, String), DerivedFact>,
}

/// Raw store en memoria. Un único mutex serializa las escrituras, lo que da
/// el mismo resultado que una ejecución secuencial de las unidades.
#[derive(Debug, Default)]
pub struct InMemoryRawStore {
    tables: Mutex<Tables>,
}

impl InMemoryRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Unavailable("in-memory store poisoned".into()))
    }
}

impl RawStore for InMemoryRawStore {
    fn upsert_unit(&self, unit: &str, records: &[IncomingRecord], loaded_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tables = self.lock()?;
        for rec in records {
            tables.records
                  .entry(rec.record_id)
                  .and_modify(|row| {
                      row.payload = rec.payload.clone();
                      row.loaded_at = loaded_at;
                  })
                  .or_insert_with(|| RawRecord { record_id: rec.record_id,
                                                 source_channel: rec.source_channel.clone(),
                                                 payload: rec.payload.clone(),
                                                 loaded_at });
        }
        log::debug!("unit {unit}: {} upserts applied", records.len());
        Ok(records.len())
    }

    fn insert_facts(&self,
                    record_id: RecordId,
                    detections: &[Detection],
                    detected_at: DateTime<Utc>)
                    -> Result<FactInsertOutcome, StoreError> {
        let mut tables = self.lock()?;
        let mut outcome = FactInsertOutcome::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for d in detections {
            let key = (record_id, d.label.clone());
            if !seen.insert(d.label.as_str()) || tables.facts.contains_key(&key) {
                outcome.duplicates += 1;
                continue;
            }
            tables.facts.insert(key,
                                DerivedFact { record_id,
                                              fact_label: d.label.clone(),
                                              confidence: d.confidence,
                                              detected_at });
            outcome.written += 1;
        }
        Ok(outcome)
    }

    fn record(&self, record_id: RecordId) -> Result<Option<RawRecord>, StoreError> {
        Ok(self.lock()?.records.get(&record_id).cloned())
    }

    fn records(&self) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn facts_for(&self, record_id: RecordId) -> Result<Vec<DerivedFact>, StoreError> {
        Ok(self.lock()?
               .facts
               .range((record_id, String::new())..)
               .take_while(|((id, _), _)| *id == record_id)
               .map(|(_, f)| f.clone())
               .collect())
    }

    fn facts(&self) -> Result<Vec<DerivedFact>, StoreError> {
        Ok(self.lock()?.facts.values().cloned().collect())
    }

    fn count_records(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.records.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn incoming(id: RecordId, channel: &str, text: &str) -> IncomingRecord {
        IncomingRecord { record_id: id,
                         source_channel: channel.into(),
                         payload: json!({ "id": id, "text": text }) }
    }

    #[test]
    fn upsert_overwrites_payload_but_keeps_channel() {
        let store = InMemoryRawStore::new();
        let t0 = Utc::now();
        store.upsert_unit("a.json", &[incoming(1, "X", "hello")], t0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(5);
        store.upsert_unit("b.json", &[incoming(1, "Y", "hello v2")], t1).unwrap();

        assert_eq!(store.count_records().unwrap(), 1);
        let row = store.record(1).unwrap().unwrap();
        assert_eq!(row.payload["text"], "hello v2");
        assert_eq!(row.source_channel, "X");
        assert_eq!(row.loaded_at, t1);
    }

    #[test]
    fn facts_are_first_write_wins() {
        let store = InMemoryRawStore::new();
        let now = Utc::now();
        let first = store.insert_facts(7, &[Detection::new("box", 0.9)], now).unwrap();
        assert_eq!(first, FactInsertOutcome { written: 1, duplicates: 0 });

        let again = store.insert_facts(7, &[Detection::new("box", 0.99), Detection::new("bottle", 0.6)], now)
                         .unwrap();
        assert_eq!(again, FactInsertOutcome { written: 1, duplicates: 1 });
        let facts = store.facts_for(7).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts.iter().find(|f| f.fact_label == "box").map(|f| f.confidence), Some(0.9));
        assert!(store.facts_for(8).unwrap().is_empty());
    }
}
