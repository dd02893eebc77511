use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::RecordId;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.45;

/// Resultado de enriquecimiento. Único por (`record_id`, `fact_label`); una
/// vez escrito no se sobreescribe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFact {
    pub record_id: RecordId,
    pub fact_label: String,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

/// Salida cruda del detector para un artefacto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self { label: label.into(),
               confidence }
    }
}

/// Artefacto derivado (imagen) asociado a un registro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub record_id: RecordId,
    pub path: PathBuf,
}

/// Umbral de confianza validado en [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThreshold(f64);

impl ConfidenceThreshold {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Se conserva una detección con confianza finita en [umbral, 1].
    pub fn keeps(&self, detection: &Detection) -> bool {
        let c = detection.confidence;
        c.is_finite() && c <= 1.0 && c >= self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_discards_low_and_invalid_confidences() {
        let t = ConfidenceThreshold::default();
        assert!(t.keeps(&Detection::new("box", 0.9)));
        assert!(t.keeps(&Detection::new("edge", 0.45)));
        assert!(!t.keeps(&Detection::new("bag", 0.3)));
        assert!(!t.keeps(&Detection::new("nan", f64::NAN)));
        assert!(!t.keeps(&Detection::new("big", 1.5)));
        assert!(ConfidenceThreshold::new(1.2).is_none());
    }
}
