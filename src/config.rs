//! Configuración de la aplicación.
//!
//! Se lee una sola vez del entorno (y de `.env`, vía `tele_persistence`) y se
//! pasa explícitamente a cada componente. Un valor inválido produce un
//! `ConfigError` que nombra la variable.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tele_core::DailySchedule;
use tele_domain::ConfidenceThreshold;
use tele_persistence::{init_dotenv, DbConfig};
use thiserror::Error;

pub const DEFAULT_CHANNELS: &str = "lobelia4cosmetics,tikvahpharma,CheMed123";
pub const DEFAULT_LAKE_DIR: &str = "data/raw";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_SCRAPE_LIMIT: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {var} ('{value}'): {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self { var,
               value: value.to_string(),
               reason: reason.into() }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None`: sin datos de conexión, se usan los stores en memoria.
    pub database: Option<DbConfig>,
    pub channels: Vec<String>,
    pub lake_dir: PathBuf,
    pub threshold: ConfidenceThreshold,
    pub concurrency: usize,
    pub schedule: DailySchedule,
    /// `None` desactiva el techo por stage.
    pub stage_timeout: Option<Duration>,
    pub scraper_cmd: Option<String>,
    pub detector_cmd: Option<String>,
    pub transform_sql_dir: Option<PathBuf>,
    pub scrape_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        init_dotenv();
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let set = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let channels: Vec<String> = set("TELEGRAM_CHANNELS").unwrap_or_else(|| DEFAULT_CHANNELS.to_string())
                                                            .split(',')
                                                            .map(str::trim)
                                                            .filter(|c| !c.is_empty())
                                                            .map(str::to_string)
                                                            .collect();

        let threshold = match set("CONFIDENCE_THRESHOLD") {
            None => ConfidenceThreshold::default(),
            Some(raw) => {
                let value: f64 = parse("CONFIDENCE_THRESHOLD", &raw)?;
                ConfidenceThreshold::new(value).ok_or_else(|| ConfigError::new("CONFIDENCE_THRESHOLD", &raw, "must be within [0, 1]"))?
            }
        };

        let concurrency = match set("PIPELINE_CONCURRENCY") {
            None => DEFAULT_CONCURRENCY,
            Some(raw) => match parse::<usize>("PIPELINE_CONCURRENCY", &raw)? {
                0 => return Err(ConfigError::new("PIPELINE_CONCURRENCY", &raw, "must be at least 1")),
                n => n,
            },
        };

        let schedule = match set("PIPELINE_SCHEDULE") {
            None => DailySchedule::default(),
            Some(raw) => parse("PIPELINE_SCHEDULE", &raw)?,
        };

        let timeout_secs = match set("STAGE_TIMEOUT_SECS") {
            None => DEFAULT_STAGE_TIMEOUT_SECS,
            Some(raw) => parse("STAGE_TIMEOUT_SECS", &raw)?,
        };

        let scrape_limit = match set("SCRAPE_LIMIT") {
            None => DEFAULT_SCRAPE_LIMIT,
            Some(raw) => parse("SCRAPE_LIMIT", &raw)?,
        };

        let min_connections = set("DATABASE_MIN_CONNECTIONS").map(|raw| parse::<u32>("DATABASE_MIN_CONNECTIONS", &raw))
                                                              .transpose()?;
        let max_connections = set("DATABASE_MAX_CONNECTIONS").map(|raw| parse::<u32>("DATABASE_MAX_CONNECTIONS", &raw))
                                                              .transpose()?;
        let database = DbConfig::from_lookup(&lookup).map(|mut db| {
                                                         db.min_connections = min_connections.unwrap_or(db.min_connections);
                                                         db.max_connections = max_connections.unwrap_or(db.max_connections);
                                                         db
                                                     });

        Ok(Self { database,
                  channels,
                  lake_dir: set("DATA_LAKE_DIR").map_or_else(|| PathBuf::from(DEFAULT_LAKE_DIR), PathBuf::from),
                  threshold,
                  concurrency,
                  schedule,
                  stage_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                  scraper_cmd: set("SCRAPER_CMD"),
                  detector_cmd: set("DETECTOR_CMD"),
                  transform_sql_dir: set("TRANSFORM_SQL_DIR").map(PathBuf::from),
                  scrape_limit })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
    where T: FromStr,
          T::Err: std::fmt::Display
{
    raw.parse().map_err(|e: T::Err| ConfigError::new(var, raw, e.to_string()))
}
