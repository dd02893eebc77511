//! Colaboradores externos, especificados sólo en su frontera.
use std::path::Path;

use serde_json::Value;

use crate::error::{DetectorError, ScrapeError, TransformError};
use crate::fact::Detection;

/// Detector de objetos tratado como caja negra.
pub trait Detector: Send + Sync {
    fn detect(&self, artifact: &Path) -> Result<Vec<Detection>, DetectorError>;
}

/// Cliente de scraping: devuelve los mensajes recientes de un canal como
/// objetos JSON. Puede dejar imágenes en `images_dir` (`<id>.jpg`).
pub trait ChannelScraper: Send + Sync {
    fn scrape(&self, channel: &str, limit: usize, images_dir: &Path) -> Result<Vec<Value>, ScrapeError>;
}

/// Transformación analítica (SQL) sobre el raw store. Devuelve la cantidad
/// de scripts aplicados.
pub trait Transformer: Send + Sync {
    fn transform(&self) -> Result<usize, TransformError>;
}
