use serde::{Deserialize, Serialize};

/// Conteos de una pasada del loader. Sin detalle por registro (sólo logs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Registros leídos de unidades que se pudieron parsear.
    pub processed: usize,
    /// Upserts confirmados.
    pub upserted: usize,
    pub skipped_invalid: usize,
    /// Unidades de origen (archivos) encontradas.
    pub source_units: usize,
    /// Unidades revertidas completas (`TransactionError`).
    pub failed_units: usize,
}

impl LoadSummary {
    pub fn merge(&mut self, other: &LoadSummary) {
        self.processed += other.processed;
        self.upserted += other.upserted;
        self.skipped_invalid += other.skipped_invalid;
        self.source_units += other.source_units;
        self.failed_units += other.failed_units;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichSummary {
    pub artifacts_processed: usize,
    pub facts_written: usize,
    pub facts_skipped_duplicate: usize,
    pub facts_below_threshold: usize,
    /// Artefactos con `DetectorError` o fallo del store.
    pub artifacts_failed: usize,
}

impl EnrichSummary {
    pub fn merge(&mut self, other: &EnrichSummary) {
        self.artifacts_processed += other.artifacts_processed;
        self.facts_written += other.facts_written;
        self.facts_skipped_duplicate += other.facts_skipped_duplicate;
        self.facts_below_threshold += other.facts_below_threshold;
        self.artifacts_failed += other.artifacts_failed;
    }
}
