// tele-domain library entry point
pub mod collaborators;
pub mod error;
pub mod fact;
pub mod record;
pub mod store;
pub mod summary;

pub use collaborators::{ChannelScraper, Detector, Transformer};
pub use error::{DetectorError, InvalidRecordError, ScrapeError, StoreError, TransactionError, TransformError};
pub use fact::{ArtifactRef, ConfidenceThreshold, DerivedFact, Detection, DEFAULT_CONFIDENCE_THRESHOLD};
pub use record::{IncomingRecord, RawRecord, RecordId};
pub use store::{FactInsertOutcome, InMemoryRawStore, RawStore};
pub use summary::{EnrichSummary, LoadSummary};
