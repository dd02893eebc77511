//! Grafo de stages: declaración explícita (`GraphBuilder`), validación única
//! al construir (`StageGraph`) y resolución de selecciones por run.

mod builder;
mod dag;
mod selection;

pub use builder::GraphBuilder;
pub use dag::{StageGraph, StageNode};
pub use selection::Selection;
