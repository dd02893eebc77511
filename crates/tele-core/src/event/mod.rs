//! Audit trail de runs: eventos append-only y trait `RunEventStore`.

mod store;
mod types;

pub use store::{run_ids, InMemoryRunEventStore, RunEventStore};
pub use types::{RunEvent, RunEventKind, SkipReason, Trigger};
