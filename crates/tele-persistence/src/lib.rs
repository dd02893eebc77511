//! tele-persistence
//!
//! Implementaciones Postgres (Diesel + r2d2) de los contratos de
//! almacenamiento del pipeline, con paridad 1:1 respecto a los backends en
//! memoria.
//!
//! Módulos:
//! - `pg`: pool, `PgRawStore`, `PgRunEventStore`, `SqlScriptTransformer`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración de conexión desde el entorno / `.env`.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_config, ConnectionProvider, PgPool, PgRawStore, PgRunEventStore, PoolProvider,
             SqlScriptTransformer};
