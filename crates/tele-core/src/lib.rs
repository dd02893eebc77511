//! tele-core: grafo de stages, scheduler secuencial y audit trail de runs.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod graph;
pub mod hashing;
pub mod repo;
pub mod schedule;
pub mod stage;

pub use engine::{CancelToken, ExecutionContext, Scheduler};
pub use errors::{AuditError, EngineError, GraphError, StageError};
pub use event::{InMemoryRunEventStore, RunEvent, RunEventKind, RunEventStore, SkipReason, Trigger};
pub use graph::{GraphBuilder, Selection, StageGraph};
pub use repo::{InMemoryRunRepository, RunRepository, RunResult, RunStatus, StageOutcome};
pub use schedule::DailySchedule;
pub use stage::{FnStage, StageDefinition, StageKind, StageReport, StageRunResult, StageStatus};
