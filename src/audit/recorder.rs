//! Audit recorder.
//!
//! Orchestrates one recording: validate, hash, submit to both ledgers,
//! verify, persist. Ledger-level failures never surface as errors; they are
//! carried in the outcome and in `submission_errors`.

use crate::audit::record::{AuditRecord, SubmissionError, VerificationOutcome, VerificationStatus};
use crate::audit::retry::{submit_with_retry, RetryFailure, RetryPolicy};
use crate::audit::store::{AuditStore, InsertOutcome, JsonlAuditStore, MemoryAuditStore};
use crate::audit::trail::AuditTrailQuery;
use crate::audit::verifier::CrossChainVerifier;
use crate::config::AuditConfig;
use crate::core::{now, ContentHash, Error, Result, TransactionId};
use crate::crypto::sha3_256;
use crate::events::{AccessDecision, AuditEvent, ComplianceEvent, PolicyChange};
use crate::hashing::CanonicalHasher;
use crate::ledger::{create_ledger_adapters, LedgerAdapter, LedgerKind, LedgerReceipt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Recorder settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RecorderConfig {
    /// Upper bound on each submission attempt
    pub call_timeout: Duration,
    /// Shared budget for the verification re-queries
    pub verification_budget: Duration,
    /// Retry policy, applied to each ledger independently
    pub retry: RetryPolicy,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for RecorderConfig {
    fn from(config: &AuditConfig) -> Self {
        Self {
            call_timeout: config.call_timeout(),
            verification_budget: config.verification_budget(),
            retry: config.retry.clone(),
        }
    }
}

/// Stages of one recording, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingStage {
    Received,
    Validated,
    Hashed,
    Submitted,
    Verified,
    Persisted,
    Reused,
}

impl std::fmt::Display for RecordingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordingStage::Received => "received",
            RecordingStage::Validated => "validated",
            RecordingStage::Hashed => "hashed",
            RecordingStage::Submitted => "submitted",
            RecordingStage::Verified => "verified",
            RecordingStage::Persisted => "persisted",
            RecordingStage::Reused => "reused",
        };
        f.write_str(name)
    }
}

/// What a recording call hands back to its caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub content_hash: ContentHash,
    pub sequence: u64,
    pub permissioned_receipt: Option<LedgerReceipt>,
    pub public_receipt: Option<LedgerReceipt>,
    pub outcome: VerificationOutcome,
    pub submission_errors: Vec<SubmissionError>,
    /// An earlier record for the same content was returned instead
    pub reused: bool,
}

impl RecordingResult {
    fn from_record(record: AuditRecord, reused: bool) -> Self {
        Self {
            content_hash: record.content_hash,
            sequence: record.sequence,
            permissioned_receipt: record.permissioned_receipt,
            public_receipt: record.public_receipt,
            outcome: record.outcome,
            submission_errors: record.submission_errors,
            reused,
        }
    }

    /// Transaction id on the permissioned ledger.
    pub fn permissioned_tx(&self) -> Option<&TransactionId> {
        self.permissioned_receipt.as_ref().map(|r| &r.transaction_id)
    }

    /// Transaction id on the public ledger.
    pub fn public_tx(&self) -> Option<&TransactionId> {
        self.public_receipt.as_ref().map(|r| &r.transaction_id)
    }

    pub fn status(&self) -> VerificationStatus {
        self.outcome.status
    }
}

/// Reachability of both ledgers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHealth {
    pub permissioned: bool,
    pub public: bool,
}

/// Dual-ledger audit recorder.
pub struct AuditRecorder {
    permissioned: Arc<dyn LedgerAdapter>,
    public: Arc<dyn LedgerAdapter>,
    store: Arc<dyn AuditStore>,
    verifier: CrossChainVerifier,
    config: RecorderConfig,
    next_sequence: AtomicU64,
}

impl AuditRecorder {
    /// Create a recorder. Sequence numbers continue after the highest one
    /// already in `store`.
    pub async fn new(
        permissioned: Arc<dyn LedgerAdapter>,
        public: Arc<dyn LedgerAdapter>,
        store: Arc<dyn AuditStore>,
        config: RecorderConfig,
    ) -> Result<Self> {
        if permissioned.kind() != LedgerKind::Permissioned || public.kind() != LedgerKind::Public {
            return Err(Error::Config(format!(
                "ledger adapters out of order: got {} and {}",
                permissioned.kind(),
                public.kind()
            )));
        }

        let next_sequence = store.last_sequence().await?.map_or(1, |s| s + 1);
        let verifier = CrossChainVerifier::new(
            permissioned.clone(),
            public.clone(),
            config.verification_budget,
        );

        Ok(Self {
            permissioned,
            public,
            store,
            verifier,
            config,
            next_sequence: AtomicU64::new(next_sequence),
        })
    }

    /// Build the ledgers and store described by `config`.
    pub async fn from_config(config: &AuditConfig) -> Result<Self> {
        let ledgers = create_ledger_adapters(config)?;
        let store: Arc<dyn AuditStore> = match &config.store.path {
            Some(path) => Arc::new(JsonlAuditStore::open(path)?),
            None => Arc::new(MemoryAuditStore::new()),
        };
        Self::new(ledgers.permissioned, ledgers.public, store, RecorderConfig::from(config)).await
    }

    /// The backing record store.
    pub fn store(&self) -> Arc<dyn AuditStore> {
        self.store.clone()
    }

    /// A trail query over this recorder's store.
    pub fn trail(&self) -> AuditTrailQuery {
        AuditTrailQuery::new(self.store.clone())
    }

    pub async fn record_access_decision(&self, event: AccessDecision) -> Result<RecordingResult> {
        self.record(event.into()).await
    }

    pub async fn record_policy_change(&self, event: PolicyChange) -> Result<RecordingResult> {
        self.record(event.into()).await
    }

    pub async fn record_compliance_event(&self, event: ComplianceEvent) -> Result<RecordingResult> {
        self.record(event.into()).await
    }

    /// Record any event on both ledgers.
    ///
    /// Fails only when the event is invalid, cannot be encoded, or the
    /// record cannot be persisted.
    pub async fn record(&self, event: AuditEvent) -> Result<RecordingResult> {
        let kind = event.kind();
        debug!(%kind, subject = %event.subject(), stage = %RecordingStage::Received, "recording event");

        if let Err(e) = event.validate() {
            warn!(%kind, error = %e, "rejected invalid event");
            return Err(e);
        }
        debug!(%kind, stage = %RecordingStage::Validated, "event validated");

        let payload = match CanonicalHasher::canonical_bytes(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%kind, subject = %event.subject(), error = %e, "event cannot be encoded");
                return Err(e);
            }
        };
        let content_hash = sha3_256(&payload);
        if let Some(existing) = self.store.get(&content_hash).await? {
            info!(%content_hash, sequence = existing.sequence, stage = %RecordingStage::Reused, "event already recorded");
            return Ok(RecordingResult::from_record(existing, true));
        }

        // trail position is fixed here, before either ledger answers
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let created_at = now();
        debug!(%kind, %content_hash, sequence, stage = %RecordingStage::Hashed, "event hashed");

        let timeout = self.config.call_timeout;
        let retry = &self.config.retry;
        let (permissioned, public) = futures::future::join(
            submit_with_retry(self.permissioned.as_ref(), &content_hash, &payload, timeout, retry),
            submit_with_retry(self.public.as_ref(), &content_hash, &payload, timeout, retry),
        )
        .await;

        let mut submission_errors = Vec::new();
        let permissioned_receipt = settle(LedgerKind::Permissioned, permissioned, &mut submission_errors);
        let public_receipt = settle(LedgerKind::Public, public, &mut submission_errors);
        debug!(
            %content_hash,
            permissioned = permissioned_receipt.is_some(),
            public = public_receipt.is_some(),
            stage = %RecordingStage::Submitted,
            "submissions settled"
        );

        let outcome = self
            .verifier
            .verify(permissioned_receipt.as_ref(), public_receipt.as_ref(), &content_hash)
            .await;
        debug!(%content_hash, status = %outcome.status, stage = %RecordingStage::Verified, "verification finished");

        let record = AuditRecord {
            sequence,
            event,
            content_hash: content_hash.clone(),
            permissioned_receipt,
            public_receipt,
            outcome,
            submission_errors,
            created_at,
        };

        match self.store.insert(record.clone()).await? {
            InsertOutcome::Inserted => {
                let status = record.outcome.status;
                if status == VerificationStatus::Verified {
                    info!(%kind, %content_hash, sequence, %status, stage = %RecordingStage::Persisted, "audit record persisted");
                } else {
                    warn!(%kind, %content_hash, sequence, %status, detail = ?record.outcome.detail, stage = %RecordingStage::Persisted, "audit record persisted without full verification");
                }
                Ok(RecordingResult::from_record(record, false))
            }
            InsertOutcome::Existing(existing) => {
                info!(%content_hash, sequence = existing.sequence, stage = %RecordingStage::Reused, "concurrent recording won, reusing its record");
                Ok(RecordingResult::from_record(existing, true))
            }
        }
    }

    /// Re-check a persisted record against both ledgers.
    ///
    /// The stored record is left untouched.
    pub async fn reverify(&self, content_hash: &ContentHash) -> Result<VerificationOutcome> {
        let record = self
            .store
            .get(content_hash)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no audit record for {}", content_hash)))?;

        Ok(self
            .verifier
            .verify(
                record.permissioned_receipt.as_ref(),
                record.public_receipt.as_ref(),
                &record.content_hash,
            )
            .await)
    }

    /// Whether a ledger transaction is committed with its record's hash.
    pub async fn verify_transaction(&self, transaction_id: &TransactionId) -> Result<bool> {
        let record = self
            .store
            .find_by_transaction(transaction_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no audit record holds {}", transaction_id)))?;

        let (ledger, receipt) = record
            .ledger_of(transaction_id)
            .and_then(|ledger| record.receipt(ledger).map(|r| (ledger, r)))
            .ok_or_else(|| {
                Error::Internal(format!("record index out of sync for {}", transaction_id))
            })?;

        match self.verifier.confirm(ledger, receipt, &record.content_hash).await {
            Ok(confirmed) => Ok(confirmed),
            Err(Error::HashMismatch { expected, found }) => {
                error!(%transaction_id, %ledger, expected = %expected, found = %found, "transaction no longer matches its audit record");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Probe both ledgers concurrently.
    pub async fn health(&self) -> LedgerHealth {
        let (permissioned, public) =
            futures::future::join(self.permissioned.health_check(), self.public.health_check())
                .await;
        LedgerHealth {
            permissioned: permissioned.unwrap_or(false),
            public: public.unwrap_or(false),
        }
    }
}

fn settle(
    ledger: LedgerKind,
    result: std::result::Result<(LedgerReceipt, u32), RetryFailure>,
    errors: &mut Vec<SubmissionError>,
) -> Option<LedgerReceipt> {
    match result {
        Ok((receipt, _attempts)) => Some(receipt),
        Err(failure) => {
            errors.push(SubmissionError::new(ledger, &failure.error, failure.attempts));
            None
        }
    }
}
