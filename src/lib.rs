//! # Dual-Ledger Audit
//!
//! Records security-relevant events on two independent append-only ledgers
//! and keeps a verifiable, replayable trail:
//! - **Hashing**: canonical, domain-separated SHA3-256 content hashes
//! - **Ledgers**: a permissioned (endorsed) ledger and a public (hash-linked) one
//! - **Verification**: concurrent re-query of both ledgers per record
//! - **Trail**: ordered, restartable audit trails from persisted records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dual_ledger_audit::audit::AuditRecorder;
//! use dual_ledger_audit::config::AuditConfig;
//! use dual_ledger_audit::events::{AccessDecision, Decision};
//!
//! #[tokio::main]
//! async fn main() -> dual_ledger_audit::Result<()> {
//!     let recorder = AuditRecorder::from_config(&AuditConfig::from_env()?).await?;
//!     let result = recorder
//!         .record_access_decision(AccessDecision::new("alice", "payroll", "read", Decision::Permit))
//!         .await?;
//!     println!("{} {}", result.content_hash, result.status());
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod crypto;
pub mod events;
pub mod hashing;
mod journal;
pub mod ledger;
pub mod telemetry;

pub use audit::{AuditRecorder, AuditTrailQuery, CrossChainVerifier, RecordingResult};
pub use core::error::{Error, Result};
pub use hashing::CanonicalHasher;
pub use ledger::{LedgerAdapter, LedgerKind, LedgerReceipt};
