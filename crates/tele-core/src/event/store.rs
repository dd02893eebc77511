use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{RunEvent, RunEventKind};
use crate::errors::AuditError;

/// Almacenamiento de eventos de run, append-only.
///
/// Contrato:
/// - `seq` es monotónico en todo el store (no sólo por run), de modo que el
///   historial completo tiene orden total.
/// - No hay updates ni deletes.
pub trait RunEventStore {
    /// Agrega un evento y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> Result<RunEvent, AuditError>;
    /// Eventos de un run (orden ascendente por seq).
    fn list(&self, run_id: Uuid) -> Result<Vec<RunEvent>, AuditError>;
    /// Todos los eventos de todos los runs (orden ascendente por seq).
    fn history(&self) -> Result<Vec<RunEvent>, AuditError>;
}

impl<T: RunEventStore + ?Sized> RunEventStore for Box<T> {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> Result<RunEvent, AuditError> {
        (**self).append_kind(run_id, kind)
    }
    fn list(&self, run_id: Uuid) -> Result<Vec<RunEvent>, AuditError> {
        (**self).list(run_id)
    }
    fn history(&self) -> Result<Vec<RunEvent>, AuditError> {
        (**self).history()
    }
}

/// Ids de run en orden de primera aparición.
pub fn run_ids(history: &[RunEvent]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for ev in history {
        if !ids.contains(&ev.run_id) {
            ids.push(ev.run_id);
        }
    }
    ids
}

#[derive(Debug, Default)]
pub struct InMemoryRunEventStore {
    inner: HashMap<Uuid, Vec<RunEvent>>,
    next_seq: u64,
}

impl InMemoryRunEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunEventStore for InMemoryRunEventStore {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> Result<RunEvent, AuditError> {
        let ev = RunEvent { seq: self.next_seq,
                            run_id,
                            kind,
                            ts: Utc::now() };
        self.next_seq += 1;
        self.inner.entry(run_id).or_default().push(ev.clone());
        Ok(ev)
    }

    fn list(&self, run_id: Uuid) -> Result<Vec<RunEvent>, AuditError> {
        Ok(self.inner.get(&run_id).cloned().unwrap_or_default())
    }

    fn history(&self) -> Result<Vec<RunEvent>, AuditError> {
        let mut all: Vec<RunEvent> = self.inner.values().flatten().cloned().collect();
        all.sort_by_key(|e| e.seq);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_global_across_runs() {
        let mut store = InMemoryRunEventStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.append_kind(a, RunEventKind::StageStarted { stage_id: "x".into() }).expect("append");
        store.append_kind(b, RunEventKind::StageStarted { stage_id: "y".into() }).expect("append");
        store.append_kind(a, RunEventKind::StageStarted { stage_id: "z".into() }).expect("append");

        let history = store.history().expect("history");
        let seqs: Vec<u64> = history.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(run_ids(&history), vec![a, b]);
        assert_eq!(store.list(a).expect("list").len(), 2);
    }
}
