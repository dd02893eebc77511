//! Definiciones relacionadas a Stages.
//!
//! Un Stage es una unidad de trabajo con efectos (extraer, cargar,
//! transformar, enriquecer). El scheduler sólo le aporta orden y aislamiento
//! de fallos; el cuerpo es opaco. Este módulo define:
//! - `StageDefinition`: interfaz síncrona usada por el scheduler.
//! - `StageReport` / `StageRunResult`: resultado de una invocación.
//! - `StageStatus`: estado de un stage dentro de un run.
//! - `FnStage`: stage construido a partir de una closure.

pub mod definition;
mod fn_stage;
mod run_result;
mod status;

pub use definition::{StageDefinition, StageKind};
pub use fn_stage::FnStage;
pub use run_result::{StageReport, StageRunResult};
pub use status::StageStatus;
