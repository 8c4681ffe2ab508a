//! Dual-ledger audit layer
//!
//! Records events on both ledgers and keeps an append-only record of the
//! outcome:
//! - Recorder (validate, hash, submit, verify, persist)
//! - Cross-chain verification
//! - Record stores (memory, JSON lines)
//! - Trail queries

pub mod filter;
pub mod record;
pub mod recorder;
pub mod retry;
pub mod store;
pub mod trail;
pub mod verifier;

pub use filter::TrailFilter;
pub use record::{
    AuditRecord, AuditRecordSummary, SubmissionError, VerificationOutcome, VerificationStatus,
};
pub use recorder::{AuditRecorder, LedgerHealth, RecorderConfig, RecordingResult, RecordingStage};
pub use retry::{submit_with_retry, RetryFailure, RetryPolicy};
pub use store::{AuditStore, InsertOutcome, JsonlAuditStore, MemoryAuditStore};
pub use trail::{AuditTrail, AuditTrailQuery};
pub use verifier::CrossChainVerifier;
