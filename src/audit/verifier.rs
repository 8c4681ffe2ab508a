//! Cross-chain verification.
//!
//! Submission-time receipts are not trusted on their own: a ledger may
//! accept an entry and later fail to finalize it. Each present receipt is
//! re-queried once, both re-queries concurrently under a single deadline.

use crate::audit::record::{VerificationOutcome, VerificationStatus};
use crate::core::{now, ContentHash, Error, Result};
use crate::ledger::{LedgerAdapter, LedgerKind, LedgerReceipt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// What one re-query established.
#[derive(Clone, Debug, PartialEq)]
enum Requery {
    Confirmed,
    Unconfirmed(String),
    Mismatch(String),
}

/// Reconciles the receipts of both ledgers for one content hash.
#[derive(Clone)]
pub struct CrossChainVerifier {
    permissioned: Arc<dyn LedgerAdapter>,
    public: Arc<dyn LedgerAdapter>,
    budget: Duration,
}

impl CrossChainVerifier {
    /// Create a verifier with a shared re-query budget.
    pub fn new(
        permissioned: Arc<dyn LedgerAdapter>,
        public: Arc<dyn LedgerAdapter>,
        budget: Duration,
    ) -> Self {
        Self {
            permissioned,
            public,
            budget,
        }
    }

    /// Re-query budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Decide whether both ledgers agree `content_hash` was committed.
    pub async fn verify(
        &self,
        permissioned_receipt: Option<&LedgerReceipt>,
        public_receipt: Option<&LedgerReceipt>,
        content_hash: &ContentHash,
    ) -> VerificationOutcome {
        let started = Instant::now();

        // Disagreement visible on the receipts alone needs no re-query.
        let mut mismatches = Vec::new();
        for receipt in [permissioned_receipt, public_receipt].into_iter().flatten() {
            if &receipt.content_hash != content_hash {
                mismatches.push(format!(
                    "{} receipt {} references {}",
                    receipt.ledger, receipt.transaction_id, receipt.content_hash
                ));
            }
        }
        if let (Some(a), Some(b)) = (permissioned_receipt, public_receipt) {
            if a.content_hash != b.content_hash && mismatches.is_empty() {
                mismatches.push(format!(
                    "receipts disagree: {} vs {}",
                    a.content_hash, b.content_hash
                ));
            }
        }
        if !mismatches.is_empty() {
            let detail = mismatches.join("; ");
            error!(%content_hash, detail = %detail, "hash mismatch across ledgers, flagged for manual audit");
            return Self::outcome(VerificationStatus::Failed, started, false, false, true, Some(detail));
        }

        let deadline = started + self.budget;
        let (permissioned, public) = futures::future::join(
            self.requery(self.permissioned.as_ref(), permissioned_receipt, content_hash, deadline),
            self.requery(self.public.as_ref(), public_receipt, content_hash, deadline),
        )
        .await;

        let mut notes = Vec::new();
        let mut hash_mismatch = false;
        for (ledger, confirmation) in [
            (LedgerKind::Permissioned, &permissioned),
            (LedgerKind::Public, &public),
        ] {
            match confirmation {
                Requery::Confirmed => {}
                Requery::Unconfirmed(reason) => notes.push(format!("{}: {}", ledger, reason)),
                Requery::Mismatch(reason) => {
                    hash_mismatch = true;
                    notes.push(format!("{}: {}", ledger, reason));
                }
            }
        }

        let permissioned_confirmed = permissioned == Requery::Confirmed;
        let public_confirmed = public == Requery::Confirmed;
        let status = if hash_mismatch {
            VerificationStatus::Failed
        } else {
            match (permissioned_confirmed, public_confirmed) {
                (true, true) => VerificationStatus::Verified,
                (true, false) | (false, true) => VerificationStatus::Partial,
                (false, false) => VerificationStatus::Failed,
            }
        };

        let detail = if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        };
        if hash_mismatch {
            error!(%content_hash, detail = ?detail, "ledger re-query returned different content, flagged for manual audit");
        } else {
            debug!(%content_hash, %status, "cross-chain verification finished");
        }

        Self::outcome(
            status,
            started,
            permissioned_confirmed,
            public_confirmed,
            hash_mismatch,
            detail,
        )
    }

    /// Re-query a single transaction, returning whether it is committed with
    /// the expected hash.
    pub async fn confirm(
        &self,
        ledger: LedgerKind,
        receipt: &LedgerReceipt,
        content_hash: &ContentHash,
    ) -> Result<bool> {
        let adapter = match ledger {
            LedgerKind::Permissioned => self.permissioned.as_ref(),
            LedgerKind::Public => self.public.as_ref(),
        };
        let deadline = Instant::now() + self.budget;
        match self.requery(adapter, Some(receipt), content_hash, deadline).await {
            Requery::Confirmed => Ok(true),
            Requery::Unconfirmed(_) => Ok(false),
            Requery::Mismatch(reason) => Err(Error::HashMismatch {
                expected: content_hash.to_hex(),
                found: reason,
            }),
        }
    }

    async fn requery(
        &self,
        adapter: &dyn LedgerAdapter,
        receipt: Option<&LedgerReceipt>,
        content_hash: &ContentHash,
        deadline: Instant,
    ) -> Requery {
        let Some(receipt) = receipt else {
            return Requery::Unconfirmed("no receipt".into());
        };

        let queried =
            tokio::time::timeout_at(deadline, adapter.query_receipt(&receipt.transaction_id)).await;

        match queried {
            Err(_) => Requery::Unconfirmed("re-query exceeded verification budget".into()),
            Ok(Err(e)) => Requery::Unconfirmed(format!("re-query failed: {}", e)),
            Ok(Ok(None)) => Requery::Unconfirmed(format!(
                "transaction {} not found on re-query",
                receipt.transaction_id
            )),
            Ok(Ok(Some(current))) => {
                if &current.content_hash != content_hash {
                    Requery::Mismatch(format!(
                        "transaction {} now references {}",
                        current.transaction_id, current.content_hash
                    ))
                } else if current.transaction_id != receipt.transaction_id {
                    Requery::Unconfirmed(format!(
                        "re-query returned transaction {}",
                        current.transaction_id
                    ))
                } else if !current.committed {
                    Requery::Unconfirmed("not yet committed".into())
                } else {
                    Requery::Confirmed
                }
            }
        }
    }

    fn outcome(
        status: VerificationStatus,
        started: Instant,
        permissioned_confirmed: bool,
        public_confirmed: bool,
        hash_mismatch: bool,
        detail: Option<String>,
    ) -> VerificationOutcome {
        VerificationOutcome {
            status,
            checked_at: now(),
            latency_ms: started.elapsed().as_millis() as u64,
            permissioned_confirmed,
            public_confirmed,
            hash_mismatch,
            detail,
        }
    }
}
