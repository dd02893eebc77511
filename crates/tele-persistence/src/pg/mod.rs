//! Implementaciones Postgres (Diesel) de los contratos del pipeline.
//!
//! - `PgRawStore`: upsert por unidad en una transacción, hechos con
//!   `ON CONFLICT DO NOTHING`.
//! - `PgRunEventStore`: audit trail append-only con orden total por `seq`
//!   (BIGSERIAL); los `StageFailed` dejan además una fila en
//!   `stage_execution_errors` dentro de la misma transacción.
//! - `SqlScriptTransformer`: scripts `*.sql` aplicados en una transacción.
//!
//! Los errores transitorios (conflictos de serialización, IO del pool) se
//! reintentan alrededor de la transacción completa con `with_retry`.

mod event_store;
mod raw_store;
mod transform;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;

pub use event_store::{ErrorRow, PgRunEventStore};
pub use raw_store::PgRawStore;
pub use transform::{load_scripts, SqlScriptTransformer};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

/// Pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (reintentar con backoff).
pub(crate) fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos drivers reportan desconexiones como texto libre.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry con backoff lineal pequeño (15ms, 30ms, 45ms; hasta 3 reintentos).
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Construye un pool Postgres r2d2 y aplica las migraciones pendientes.
///
/// Tamaños en cero se ajustan a 1 y `min > max` se recorta a `max`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), using min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

pub fn build_pool_from_config(cfg: &DbConfig) -> Result<PgPool, PersistenceError> {
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
