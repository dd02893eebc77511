//! Los cuatro stages del pipeline y su declaración como grafo.
//!
//! ```text
//! raw_files -> raw_records -> analytics_models -> image_detections
//! ```

pub mod enrich;
pub mod extract;
pub mod load;
pub mod transform;

pub use enrich::EnrichStage;
pub use extract::ExtractStage;
pub use load::LoadStage;
pub use transform::TransformStage;

use tele_core::{GraphBuilder, GraphError, StageGraph};

pub const RAW_FILES: &str = "raw_files";
pub const RAW_RECORDS: &str = "raw_records";
pub const ANALYTICS_MODELS: &str = "analytics_models";
pub const IMAGE_DETECTIONS: &str = "image_detections";

/// Grafo estático del pipeline diario.
pub fn pipeline_graph(extract: ExtractStage,
                      load: LoadStage,
                      transform: TransformStage,
                      enrich: EnrichStage)
                      -> Result<StageGraph, GraphError> {
    GraphBuilder::new().stage(extract, &[])
                       .stage(load, &[RAW_FILES])
                       .stage(transform, &[RAW_RECORDS])
                       .stage(enrich, &[ANALYTICS_MODELS])
                       .build()
}
