//! Audit record structure.
//!
//! The durable, append-only unit combining an event, its hash, the ledger
//! receipts and the cross-chain verification outcome.

use crate::core::{to_millis, ContentHash, Error, Timestamp, TransactionId};
use crate::events::{AuditEvent, EventKind};
use crate::ledger::{LedgerKind, LedgerReceipt};
use serde::{Deserialize, Serialize};

/// Cross-chain agreement status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    /// Both ledgers confirm the same hash
    Verified,
    /// Exactly one ledger confirms
    Partial,
    /// Neither ledger confirms, or they disagree on the hash
    Failed,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "VERIFIED"),
            VerificationStatus::Partial => write!(f, "PARTIAL"),
            VerificationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of cross-chain verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Agreement status
    pub status: VerificationStatus,
    /// When the re-queries finished
    pub checked_at: Timestamp,
    /// Time spent verifying (milliseconds)
    pub latency_ms: u64,
    /// Permissioned ledger confirmed on re-query
    pub permissioned_confirmed: bool,
    /// Public ledger confirmed on re-query
    pub public_confirmed: bool,
    /// Ledgers disagree on the committed content; needs manual audit
    pub hash_mismatch: bool,
    /// Human-readable explanation
    pub detail: Option<String>,
}

impl VerificationOutcome {
    /// Whether this outcome must be reviewed by a person.
    pub fn flagged_for_review(&self) -> bool {
        self.hash_mismatch
    }
}

/// A submission that failed after its retry budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionError {
    /// Ledger that failed
    pub ledger: LedgerKind,
    /// Error class (e.g. `submission_timeout`)
    pub kind: String,
    /// Error message
    pub message: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

impl SubmissionError {
    /// Build from the last error observed for a ledger.
    pub fn new(ledger: LedgerKind, error: &Error, attempts: u32) -> Self {
        Self {
            ledger,
            kind: error.kind().to_string(),
            message: error.to_string(),
            attempts,
        }
    }
}

/// The durable, queryable unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Creation order, fixed when the event is hashed
    pub sequence: u64,
    /// The event as submitted
    pub event: AuditEvent,
    /// Content hash of the event
    pub content_hash: ContentHash,
    /// Receipt from the permissioned ledger
    pub permissioned_receipt: Option<LedgerReceipt>,
    /// Receipt from the public ledger
    pub public_receipt: Option<LedgerReceipt>,
    /// Verification outcome
    pub outcome: VerificationOutcome,
    /// Failures that left a receipt missing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submission_errors: Vec<SubmissionError>,
    /// When the event was hashed
    pub created_at: Timestamp,
}

impl AuditRecord {
    /// Event kind.
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Receipt for a given ledger.
    pub fn receipt(&self, ledger: LedgerKind) -> Option<&LedgerReceipt> {
        match ledger {
            LedgerKind::Permissioned => self.permissioned_receipt.as_ref(),
            LedgerKind::Public => self.public_receipt.as_ref(),
        }
    }

    /// The ledger that issued a transaction id, if this record holds it.
    pub fn ledger_of(&self, transaction_id: &TransactionId) -> Option<LedgerKind> {
        [LedgerKind::Permissioned, LedgerKind::Public]
            .into_iter()
            .find(|&ledger| {
                self.receipt(ledger)
                    .map(|r| &r.transaction_id == transaction_id)
                    .unwrap_or(false)
            })
    }

    /// Trail ordering key: creation time, then content hash.
    pub fn order_key(&self) -> (Timestamp, &ContentHash) {
        (self.created_at, &self.content_hash)
    }

    /// Compact view for the query API.
    pub fn summary(&self) -> AuditRecordSummary {
        AuditRecordSummary {
            sequence: self.sequence,
            kind: self.kind(),
            subject: self.event.subject().to_string(),
            content_hash: self.content_hash.clone(),
            permissioned_tx: self
                .permissioned_receipt
                .as_ref()
                .map(|r| r.transaction_id.clone()),
            public_tx: self.public_receipt.as_ref().map(|r| r.transaction_id.clone()),
            status: self.outcome.status,
            flagged_for_review: self.outcome.flagged_for_review(),
            created_at_ms: to_millis(&self.created_at),
        }
    }
}

/// Audit record summary returned by the trail query API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecordSummary {
    pub sequence: u64,
    pub kind: EventKind,
    pub subject: String,
    pub content_hash: ContentHash,
    pub permissioned_tx: Option<TransactionId>,
    pub public_tx: Option<TransactionId>,
    pub status: VerificationStatus,
    pub flagged_for_review: bool,
    pub created_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::now;
    use crate::events::{AccessDecision, Decision};
    use crate::ledger::Confirmation;

    fn receipt(ledger: LedgerKind, tx: &str) -> LedgerReceipt {
        LedgerReceipt {
            ledger,
            transaction_id: TransactionId::new(tx),
            content_hash: ContentHash::zero(),
            confirmed_at: now(),
            committed: true,
            confirmation: Confirmation::Public {
                block_height: 1,
                block_hash: ContentHash::zero(),
                confirmations: 1,
            },
        }
    }

    fn record() -> AuditRecord {
        AuditRecord {
            sequence: 7,
            event: AccessDecision::new("u-1", "r-1", "read", Decision::Permit).into(),
            content_hash: ContentHash::zero(),
            permissioned_receipt: Some(receipt(LedgerKind::Permissioned, "tx-a")),
            public_receipt: None,
            outcome: VerificationOutcome {
                status: VerificationStatus::Partial,
                checked_at: now(),
                latency_ms: 3,
                permissioned_confirmed: true,
                public_confirmed: false,
                hash_mismatch: false,
                detail: None,
            },
            submission_errors: vec![SubmissionError::new(
                LedgerKind::Public,
                &Error::SubmissionTimeout {
                    ledger: "public".into(),
                    timeout_ms: 100,
                },
                3,
            )],
            created_at: now(),
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Verified).unwrap(),
            "\"VERIFIED\""
        );
        assert_eq!(VerificationStatus::Partial.to_string(), "PARTIAL");
    }

    #[test]
    fn test_ledger_of_transaction() {
        let record = record();
        assert_eq!(
            record.ledger_of(&TransactionId::new("tx-a")),
            Some(LedgerKind::Permissioned)
        );
        assert_eq!(record.ledger_of(&TransactionId::new("tx-b")), None);
    }

    #[test]
    fn test_summary() {
        let summary = record().summary();
        assert_eq!(summary.sequence, 7);
        assert_eq!(summary.kind, EventKind::AccessDecision);
        assert_eq!(summary.subject, "u-1");
        assert_eq!(summary.permissioned_tx, Some(TransactionId::new("tx-a")));
        assert!(summary.public_tx.is_none());
        assert_eq!(summary.status, VerificationStatus::Partial);
    }

    #[test]
    fn test_submission_error_kind() {
        let record = record();
        assert_eq!(record.submission_errors[0].kind, "submission_timeout");
        assert_eq!(record.submission_errors[0].attempts, 3);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = record();
        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
