//! Permissioned ledger adapter.
//!
//! Embeds an ordering node for one channel. Every accepted entry is
//! endorsed with the node's Ed25519 key; an entry is reported committed on
//! re-query only while its endorsement still verifies.
//!
//! With a log path configured the channel is journaled to disk and replayed
//! on open, so receipts outlive the process.

use crate::core::{now, ContentHash, Error, Result, Timestamp, TransactionId};
use crate::crypto::{sha3_256, EndorsementKey};
use crate::journal::Journal;
use crate::ledger::adapter::{Confirmation, LedgerAdapter, LedgerKind, LedgerReceipt};
use crate::ledger::config::PermissionedLedgerConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One ordered entry on the channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChannelEntry {
    block_number: u64,
    transaction_id: TransactionId,
    content_hash: ContentHash,
    payload_digest: ContentHash,
    endorsement: String,
    committed_at: Timestamp,
}

#[derive(Default)]
struct ChannelLog {
    entries: Vec<ChannelEntry>,
    by_hash: HashMap<ContentHash, usize>,
    by_tx: HashMap<TransactionId, usize>,
    journal: Option<Journal>,
}

impl ChannelLog {
    fn open(path: &Path) -> Result<Self> {
        let (journal, entries) = Journal::open::<ChannelEntry>(path)?;
        let mut log = Self::default();
        for entry in entries {
            if entry.block_number != log.entries.len() as u64 {
                return Err(Error::Storage(format!(
                    "{}: expected block {} but found {}",
                    path.display(),
                    log.entries.len(),
                    entry.block_number
                )));
            }
            log.index(entry);
        }
        log.journal = Some(journal);
        Ok(log)
    }

    fn index(&mut self, entry: ChannelEntry) -> usize {
        let idx = self.entries.len();
        self.by_hash.insert(entry.content_hash.clone(), idx);
        self.by_tx.insert(entry.transaction_id.clone(), idx);
        self.entries.push(entry);
        idx
    }

    /// Journal the entry (when durable), then index it.
    fn push(&mut self, entry: ChannelEntry) -> Result<usize> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&entry).map_err(|e| Error::LedgerUnavailable {
                ledger: LedgerKind::Permissioned.to_string(),
                reason: format!("channel log write failed: {}", e),
            })?;
        }
        Ok(self.index(entry))
    }
}

/// Permissioned ledger adapter.
pub struct PermissionedLedger {
    config: PermissionedLedgerConfig,
    key: EndorsementKey,
    log: RwLock<ChannelLog>,
    online: AtomicBool,
}

impl PermissionedLedger {
    /// Create a new adapter with a fresh endorsement key.
    pub fn new(config: PermissionedLedgerConfig) -> Self {
        Self::with_key(config, EndorsementKey::generate())
    }

    /// Create a new adapter endorsing with the given key.
    pub fn with_key(config: PermissionedLedgerConfig, key: EndorsementKey) -> Self {
        Self {
            config,
            key,
            log: RwLock::new(ChannelLog::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Open an adapter from configuration, loading the endorsement key and
    /// replaying the channel log when their paths are set.
    pub fn open(config: PermissionedLedgerConfig) -> Result<Self> {
        let key = match &config.key_path {
            Some(path) => EndorsementKey::load_or_generate(path)?,
            None => EndorsementKey::generate(),
        };
        let log = match &config.log_path {
            Some(path) => {
                let log = ChannelLog::open(path)?;
                info!(
                    path = %path.display(),
                    entries = log.entries.len(),
                    "permissioned channel log replayed"
                );
                log
            }
            None => ChannelLog::default(),
        };

        Ok(Self {
            config,
            key,
            log: RwLock::new(log),
            online: AtomicBool::new(true),
        })
    }

    /// Peer endpoint.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Mark the peer reachable or unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn endorsement_message(transaction_id: &TransactionId, content_hash: &ContentHash) -> Vec<u8> {
        format!("{}:{}", transaction_id, content_hash).into_bytes()
    }

    fn receipt(&self, entry: &ChannelEntry) -> LedgerReceipt {
        let message = Self::endorsement_message(&entry.transaction_id, &entry.content_hash);
        let committed = hex::decode(&entry.endorsement)
            .map(|sig| self.key.verify(&message, &sig).is_ok())
            .unwrap_or(false);

        LedgerReceipt {
            ledger: LedgerKind::Permissioned,
            transaction_id: entry.transaction_id.clone(),
            content_hash: entry.content_hash.clone(),
            confirmed_at: entry.committed_at,
            committed,
            confirmation: Confirmation::Permissioned {
                channel: self.config.channel.clone(),
                block_number: entry.block_number,
                endorsement: entry.endorsement.clone(),
            },
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::LedgerUnavailable {
                ledger: LedgerKind::Permissioned.to_string(),
                reason: format!("peer {} unreachable", self.config.endpoint),
            })
        }
    }

    async fn append(&self, content_hash: &ContentHash, payload: &[u8]) -> Result<LedgerReceipt> {
        let mut log = self.log.write().await;

        if let Some(&idx) = log.by_hash.get(content_hash) {
            debug!(content_hash = %content_hash, "permissioned ledger: hash already ordered");
            return Ok(self.receipt(&log.entries[idx]));
        }

        let transaction_id = TransactionId::new(&uuid::Uuid::new_v4().to_string());
        let endorsement = self
            .key
            .sign(&Self::endorsement_message(&transaction_id, content_hash));
        let entry = ChannelEntry {
            block_number: log.entries.len() as u64,
            transaction_id,
            content_hash: content_hash.clone(),
            payload_digest: sha3_256(payload),
            endorsement: hex::encode(endorsement),
            committed_at: now(),
        };

        let idx = log.push(entry)?;

        debug!(
            content_hash = %content_hash,
            block_number = idx,
            "permissioned ledger: entry ordered"
        );
        Ok(self.receipt(&log.entries[idx]))
    }

    /// Digest of the payload stored for a transaction.
    pub async fn payload_digest(&self, transaction_id: &TransactionId) -> Option<ContentHash> {
        let log = self.log.read().await;
        log.by_tx
            .get(transaction_id)
            .map(|&idx| log.entries[idx].payload_digest.clone())
    }
}

#[async_trait]
impl LedgerAdapter for PermissionedLedger {
    fn kind(&self) -> LedgerKind {
        LedgerKind::Permissioned
    }

    async fn submit(
        &self,
        content_hash: &ContentHash,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<LedgerReceipt> {
        self.check_online()?;

        if payload.is_empty() {
            return Err(Error::RejectedByLedger {
                ledger: self.kind().to_string(),
                reason: "empty payload".into(),
            });
        }
        if payload.len() > self.config.max_payload_bytes {
            return Err(Error::RejectedByLedger {
                ledger: self.kind().to_string(),
                reason: format!(
                    "payload of {} bytes exceeds limit of {}",
                    payload.len(),
                    self.config.max_payload_bytes
                ),
            });
        }

        let latency = Duration::from_millis(self.config.latency_ms);
        let work = async {
            tokio::time::sleep(latency).await;
            self.append(content_hash, payload).await
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::SubmissionTimeout {
                ledger: self.kind().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn query_receipt(&self, transaction_id: &TransactionId) -> Result<Option<LedgerReceipt>> {
        self.check_online()?;
        let log = self.log.read().await;
        Ok(log
            .by_tx
            .get(transaction_id)
            .map(|&idx| self.receipt(&log.entries[idx])))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.online.load(Ordering::SeqCst))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.log.read().await.entries.len() as u64)
    }
}
