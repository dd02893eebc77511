//! Ensamblado del pipeline: backend de almacenamiento, colaboradores y grafo.
use std::sync::Arc;

use log::{info, warn};
use tele_adapters::{pipeline_graph, CommandDetector, CommandScraper, DataLake, EnrichStage, EnrichmentMerger, ExtractStage,
                    IdempotentLoader, LoadStage, TransformStage};
use tele_core::{GraphError, InMemoryRunEventStore, InMemoryRunRepository, RunEventStore, Scheduler, StageGraph};
use tele_domain::{ChannelScraper, Detector, InMemoryRawStore, RawStore, Transformer};
use tele_persistence::{build_pool_from_config, PersistenceError, PgRawStore, PgRunEventStore, PoolProvider,
                       SqlScriptTransformer};
use thiserror::Error;

use crate::config::AppConfig;

/// Scheduler del pipeline con el audit trail elegido en tiempo de ejecución.
pub type PipelineScheduler = Scheduler<Box<dyn RunEventStore + Send>, InMemoryRunRepository>;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("database setup failed: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("invalid stage graph: {0}")]
    Graph(#[from] GraphError),
}

/// Stores concretos (Postgres o memoria) y el transformer que dependen de
/// ellos.
pub struct Backend {
    pub raw_store: Arc<dyn RawStore>,
    pub event_store: Box<dyn RunEventStore + Send>,
    pub transformer: Option<Arc<dyn Transformer>>,
    pub persistent: bool,
}

impl Backend {
    pub fn in_memory() -> Self {
        Self { raw_store: Arc::new(InMemoryRawStore::new()),
               event_store: Box::new(InMemoryRunEventStore::new()),
               transformer: None,
               persistent: false }
    }

    /// Postgres si hay datos de conexión; si no, stores en memoria.
    pub fn open(cfg: &AppConfig) -> Result<Self, SetupError> {
        let Some(db) = &cfg.database else {
            warn!("no database configured; using in-memory stores (nothing survives the process)");
            if cfg.transform_sql_dir.is_some() {
                warn!("TRANSFORM_SQL_DIR ignored without a database");
            }
            return Ok(Self::in_memory());
        };
        let provider = PoolProvider { pool: build_pool_from_config(db)? };
        info!("connected to Postgres (pool {}..{})", db.min_connections, db.max_connections);
        let transformer = cfg.transform_sql_dir.as_ref().map(|dir| {
                                                            Arc::new(SqlScriptTransformer::new(provider.clone(), dir.clone()))
                                                            as Arc<dyn Transformer>
                                                        });
        Ok(Self { raw_store: Arc::new(PgRawStore::new(provider.clone())),
                  event_store: Box::new(PgRunEventStore::new(provider)),
                  transformer,
                  persistent: true })
    }
}

/// Declara los cuatro stages con los colaboradores configurados.
pub fn build_graph(cfg: &AppConfig, raw_store: Arc<dyn RawStore>, transformer: Option<Arc<dyn Transformer>>)
                   -> Result<StageGraph, GraphError> {
    let lake = DataLake::new(&cfg.lake_dir);
    let scraper = cfg.scraper_cmd
                     .as_deref()
                     .and_then(CommandScraper::new)
                     .map(|s| Arc::new(s) as Arc<dyn ChannelScraper>);
    let detector = cfg.detector_cmd
                      .as_deref()
                      .and_then(CommandDetector::new)
                      .map(|d| Arc::new(d) as Arc<dyn Detector>);
    let merger = detector.map(|d| EnrichmentMerger::new(Arc::clone(&raw_store), d, cfg.threshold, cfg.concurrency));

    pipeline_graph(ExtractStage::new(lake.clone(), cfg.channels.clone(), cfg.scrape_limit, scraper),
                   LoadStage::new(lake.clone(), IdempotentLoader::new(raw_store, cfg.concurrency)),
                   TransformStage::new(transformer),
                   EnrichStage::new(lake, merger))
}

/// Backend + grafo + scheduler listos para ejecutar.
pub fn build_scheduler(cfg: &AppConfig) -> Result<(PipelineScheduler, Arc<dyn RawStore>), SetupError> {
    let backend = Backend::open(cfg)?;
    scheduler_for(cfg, backend)
}

pub fn scheduler_for(cfg: &AppConfig, backend: Backend) -> Result<(PipelineScheduler, Arc<dyn RawStore>), SetupError> {
    let graph = build_graph(cfg, Arc::clone(&backend.raw_store), backend.transformer)?;
    info!("pipeline graph: {}", graph.topological_ids().join(" -> "));
    let scheduler = Scheduler::with_stores(graph, backend.event_store, InMemoryRunRepository::new())
        .with_stage_timeout(cfg.stage_timeout);
    Ok((scheduler, backend.raw_store))
}
