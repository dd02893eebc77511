//! Constantes del scheduler.
//!
//! `ENGINE_VERSION` entra en el hash del grafo que se registra con cada run:
//! un cambio de versión produce un `graph_hash` distinto aunque la
//! declaración de stages no cambie.

pub const ENGINE_VERSION: &str = "teleflow-1";

/// Nombre de hilo usado para los cuerpos de stage (`stage-<id>`).
pub const STAGE_THREAD_PREFIX: &str = "stage-";

/// Espera máxima por el hilo de un stage cancelado por timeout antes de
/// darlo por colgado.
pub const TIMEOUT_GRACE_SECS: u64 = 30;
