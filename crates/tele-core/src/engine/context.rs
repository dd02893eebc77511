use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StageError;

/// Señal de cancelación cooperativa.
///
/// Un token hijo (`child`) se considera cancelado si él o cualquiera de sus
/// ancestros lo está; cancelar el hijo no afecta al padre. El scheduler crea
/// un token por run y un hijo por stage para poder cortar un stage que
/// excede su timeout sin cancelar el run completo.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    pub fn child(&self) -> CancelToken {
        CancelToken { flag: Arc::new(AtomicBool::new(false)),
                      parent: Some(Box::new(self.clone())) }
    }
}

/// Contexto entregado a `StageDefinition::run`.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub stage_id: String,
    /// Instante en que se pidió el run (igual para todos sus stages).
    pub requested_at: DateTime<Utc>,
    pub cancel: CancelToken,
}

impl ExecutionContext {
    /// Contexto suelto, para invocar un stage fuera del scheduler (tests).
    pub fn detached(stage_id: impl Into<String>) -> Self {
        Self { run_id: Uuid::new_v4(),
               stage_id: stage_id.into(),
               requested_at: Utc::now(),
               cancel: CancelToken::new() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(StageError::Cancelled)` si el run o el stage fueron cancelados.
    /// Los stages lo llaman entre unidades de trabajo.
    pub fn check_cancelled(&self) -> Result<(), StageError> {
        if self.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_cancellation_but_not_vice_versa() {
        let root = CancelToken::new();
        let a = root.child();
        let b = root.child();
        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!root.is_cancelled());
        root.cancel();
        assert!(b.is_cancelled());
    }
}
