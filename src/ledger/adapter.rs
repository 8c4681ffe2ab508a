//! LedgerAdapter trait definition.
//!
//! Core trait that both ledger variants implement.

use crate::core::{ContentHash, Result, Timestamp, TransactionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger variant identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Permissioned (consortium) ledger
    Permissioned,
    /// Public blockchain
    Public,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Permissioned => write!(f, "permissioned"),
            LedgerKind::Public => write!(f, "public"),
        }
    }
}

/// Ledger-specific confirmation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Confirmation {
    /// Ordered, endorsed entry on a permissioned channel
    Permissioned {
        channel: String,
        block_number: u64,
        /// Hex-encoded Ed25519 endorsement
        endorsement: String,
    },
    /// Block inclusion on a public chain
    Public {
        block_height: u64,
        block_hash: ContentHash,
        confirmations: u64,
    },
}

/// Result of one submission to one ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Ledger that issued the receipt
    pub ledger: LedgerKind,
    /// Transaction identifier, unique per (ledger, content hash)
    pub transaction_id: TransactionId,
    /// Content hash that was submitted
    pub content_hash: ContentHash,
    /// When the ledger accepted the entry
    pub confirmed_at: Timestamp,
    /// Whether the ledger reports the entry as final
    pub committed: bool,
    /// Ledger-specific metadata
    pub confirmation: Confirmation,
}

/// Capability to append hashed records to one append-only ledger.
///
/// Implementations must tolerate concurrent calls from unrelated
/// recordings; only the append itself may be serialized internally.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Which ledger this adapter talks to.
    fn kind(&self) -> LedgerKind;

    /// Submit a hashed record.
    ///
    /// Idempotent per content hash: an already-committed hash returns the
    /// existing receipt. Fails with `SubmissionTimeout` once `timeout`
    /// elapses, `LedgerUnavailable` on transport failure and
    /// `RejectedByLedger` for payloads the ledger refuses.
    async fn submit(
        &self,
        content_hash: &ContentHash,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<LedgerReceipt>;

    /// Re-query a transaction. Returns None if the ledger has no such entry.
    async fn query_receipt(&self, transaction_id: &TransactionId) -> Result<Option<LedgerReceipt>>;

    /// Health check for the ledger.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Number of entries appended (if supported).
    async fn count(&self) -> Result<u64> {
        Ok(0)
    }
}
