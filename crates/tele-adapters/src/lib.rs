//! tele-adapters: capa entre el core (scheduler) y el dominio (raw store).
//!
//! Este crate provee:
//! - `DataLake`: layout de archivos crudos (mensajes por canal y día, imágenes).
//! - `IdempotentLoader`: merge de unidades de origen al raw store (upsert).
//! - `EnrichmentMerger`: detector caja negra + merge monotónico de hechos.
//! - Colaboradores por línea de comandos (`CommandScraper`, `CommandDetector`).
//! - Los cuatro stages del pipeline y `pipeline_graph` para declararlos.

pub mod command;
pub mod enrichment;
pub mod lake;
pub mod loader;
pub mod pool;
pub mod stages;

pub use command::{CommandDetector, CommandScraper};
pub use enrichment::EnrichmentMerger;
pub use lake::{DataLake, SourceUnit};
pub use loader::IdempotentLoader;
pub use stages::{pipeline_graph, EnrichStage, ExtractStage, LoadStage, TransformStage};
