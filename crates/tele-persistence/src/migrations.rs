//! Runner de migraciones embebidas (`migrations/` de este crate).

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Aplica las migraciones pendientes y devuelve cuántas se aplicaron.
pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<usize, PersistenceError> {
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))?;
    if !applied.is_empty() {
        info!("applied {} migration(s)", applied.len());
    }
    Ok(applied.len())
}
