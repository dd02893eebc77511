//! Ejecución de runs: scheduler, contexto de stage y política de staleness.

pub mod context;
pub mod core;
pub mod staleness;

pub use context::{CancelToken, ExecutionContext};
pub use core::Scheduler;
pub use staleness::stale_stages;
