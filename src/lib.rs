//! teleflow
//!
//! Pipeline diario de ingesta de canales de Telegram:
//! - `config`: `AppConfig` cargada una vez desde el entorno / `.env`.
//! - `pipeline`: backend (Postgres o memoria), colaboradores y scheduler.
//! - `analytics`: consultas de lectura sobre el raw store.
//!
//! El binario `teleflow` (src/main.rs) expone todo esto como CLI.

pub mod analytics;
pub mod config;
pub mod pipeline;

pub use config::{AppConfig, ConfigError};
pub use pipeline::{build_graph, build_scheduler, scheduler_for, Backend, PipelineScheduler, SetupError};
