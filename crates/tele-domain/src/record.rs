use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvalidRecordError;

/// Identificador externo estable de un mensaje.
pub type RecordId = i64;

/// Fila del raw store. Única por `record_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub record_id: RecordId,
    pub source_channel: String,
    pub payload: Value,
    /// Se refresca en cada re-carga exitosa.
    pub loaded_at: DateTime<Utc>,
}

/// Registro validado, listo para upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRecord {
    pub record_id: RecordId,
    pub source_channel: String,
    pub payload: Value,
}

impl IncomingRecord {
    /// Valida un mensaje crudo del data lake: debe ser un objeto con `id`
    /// entero. El payload se guarda completo, tal como vino.
    pub fn from_message(source_channel: &str, message: Value) -> Result<Self, InvalidRecordError> {
        let id = match message.as_object() {
            None => return Err(InvalidRecordError::NotAnObject),
            Some(obj) => match obj.get("id") {
                None => return Err(InvalidRecordError::MissingId),
                Some(Value::Null) => return Err(InvalidRecordError::NullId),
                Some(v) => v.as_i64().ok_or_else(|| InvalidRecordError::NonIntegerId(v.clone()))?,
            },
        };
        Ok(Self { record_id: id,
                  source_channel: source_channel.to_string(),
                  payload: message })
    }
}
