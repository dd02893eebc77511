//! Configuración de conexión desde variables de entorno.
//! Usa `DATABASE_URL` o, en su defecto, las variables sueltas
//! `DB_HOST`/`DB_PORT`/`POSTGRES_USER`/`POSTGRES_PASSWORD`/`POSTGRES_DB`.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    /// `None` si no hay datos de conexión en el entorno.
    pub fn from_env() -> Option<Self> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Igual que `from_env` pero leyendo de una función arbitraria (tests,
    /// configuración de la aplicación).
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
        where F: Fn(&str) -> Option<String>
    {
        let url = match lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            Some(url) => url,
            None => {
                let user = lookup("POSTGRES_USER")?;
                let db = lookup("POSTGRES_DB")?;
                let password = lookup("POSTGRES_PASSWORD").unwrap_or_default();
                let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".into());
                let port = lookup("DB_PORT").unwrap_or_else(|| "5432".into());
                format!("postgres://{user}:{password}@{host}:{port}/{db}")
            }
        };
        let min_connections = lookup("DATABASE_MIN_CONNECTIONS").and_then(|v| v.parse().ok())
                                                                .unwrap_or(DEFAULT_MIN_CONNECTIONS);
        let max_connections = lookup("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok())
                                                                .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Some(Self { url,
                    min_connections,
                    max_connections })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
