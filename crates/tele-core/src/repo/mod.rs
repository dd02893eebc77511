pub mod types;
pub use types::{InMemoryRunRepository, RunInstance, RunRepository, RunStatus, StageSlot};
pub use types::{RunResult, StageOutcome};
