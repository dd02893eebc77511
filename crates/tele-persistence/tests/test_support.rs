#![allow(dead_code)]

use once_cell::sync::Lazy;
use tele_persistence::config::DbConfig;
use tele_persistence::pg::{build_pool, PgPool};

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env()?;
    match build_pool(&cfg.url, 1, 2) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    TEST_POOL.as_ref().map(f)
}

/// Id base único por test para no chocar con datos de otras corridas.
pub fn unique_base_id() -> i64 {
    let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)
                                            .map(|d| d.as_nanos())
                                            .unwrap_or_default();
    (nanos % 1_000_000_000_000) as i64 * 1000
}
