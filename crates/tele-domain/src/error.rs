use serde_json::Value;
use thiserror::Error;

/// Registro individual rechazado por el loader (no aborta el lote).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidRecordError {
    #[error("record has no 'id' field")]
    MissingId,
    #[error("record id is null")]
    NullId,
    #[error("record id is not an integer: {0}")]
    NonIntegerId(Value),
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Fallo de una unidad de origen (archivo): nada de la unidad se confirma.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("could not read source unit {unit}: {source}")]
    Read {
        unit: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed source unit {unit}: {reason}")]
    Malformed { unit: String, reason: String },
    #[error("store rejected source unit {unit}: {source}")]
    Store {
        unit: String,
        #[source]
        source: StoreError,
    },
    #[error("source unit {unit} not committed: run cancelled")]
    Cancelled { unit: String },
}

/// Fallo del detector para un artefacto concreto.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("artifact not readable: {0}")]
    Unreadable(String),
    #[error("detector invocation failed: {0}")]
    Invocation(String),
    #[error("detector output not understood: {0}")]
    Output(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store constraint violated: {0}")]
    Constraint(String),
    #[error("store error: {0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("scraper failed for channel '{channel}': {reason}")]
    Failed { channel: String, reason: String },
    #[error("scraper output for channel '{channel}' not understood: {reason}")]
    Output { channel: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("transform script {script} failed: {reason}")]
    Script { script: String, reason: String },
    #[error("transform scripts not readable: {0}")]
    Io(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
