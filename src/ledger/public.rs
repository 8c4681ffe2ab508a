//! Public ledger adapter.
//!
//! Embeds a hash-linked chain, one block per accepted transaction. A
//! transaction counts as committed once it has the configured number of
//! confirmations and its block still links to its parent.
//!
//! With a chain path configured every block, genesis included, is journaled
//! and the chain is rebuilt from the file on open.

use crate::core::{now, ContentHash, Error, Result, Timestamp, TransactionId};
use crate::crypto::{sha3_256, sha3_256_multi};
use crate::journal::Journal;
use crate::ledger::adapter::{Confirmation, LedgerAdapter, LedgerKind, LedgerReceipt};
use crate::ledger::config::PublicLedgerConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A block on the public chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainBlock {
    /// Height in the chain
    pub height: u64,
    /// Block creation timestamp
    pub timestamp: Timestamp,
    /// Hash of the parent block
    pub parent_hash: ContentHash,
    /// Transaction carried by the block (None for genesis and filler blocks)
    pub transaction_id: Option<TransactionId>,
    /// Content hash anchored by the transaction
    pub content_hash: Option<ContentHash>,
    /// Digest of the submitted payload
    pub payload_digest: ContentHash,
    /// Hash of this block
    pub block_hash: ContentHash,
}

impl ChainBlock {
    fn genesis() -> Self {
        let mut block = Self {
            height: 0,
            timestamp: now(),
            parent_hash: ContentHash::zero(),
            transaction_id: None,
            content_hash: None,
            payload_digest: ContentHash::zero(),
            block_hash: ContentHash::zero(),
        };
        block.block_hash = block.compute_hash();
        block
    }

    fn child(
        parent: &ChainBlock,
        transaction_id: Option<TransactionId>,
        content_hash: Option<ContentHash>,
        payload_digest: ContentHash,
    ) -> Self {
        let mut block = Self {
            height: parent.height + 1,
            timestamp: now(),
            parent_hash: parent.block_hash.clone(),
            transaction_id,
            content_hash,
            payload_digest,
            block_hash: ContentHash::zero(),
        };
        block.block_hash = block.compute_hash();
        block
    }

    /// Hash over every field except the block hash itself.
    pub fn compute_hash(&self) -> ContentHash {
        let height_bytes = self.height.to_le_bytes();
        let timestamp_str = self.timestamp.to_rfc3339();
        let tx = self
            .transaction_id
            .as_ref()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default();
        let content = self
            .content_hash
            .as_ref()
            .map(|h| h.as_bytes().to_vec())
            .unwrap_or_default();

        sha3_256_multi(&[
            &height_bytes,
            timestamp_str.as_bytes(),
            self.parent_hash.as_bytes(),
            tx.as_bytes(),
            &content,
            self.payload_digest.as_bytes(),
        ])
    }

    /// Check the block hash and its link to the parent.
    pub fn verify(&self, parent: Option<&ChainBlock>) -> bool {
        if self.compute_hash() != self.block_hash {
            return false;
        }
        match parent {
            Some(parent) => {
                self.parent_hash == parent.block_hash && self.height == parent.height + 1
            }
            None => self.height == 0,
        }
    }
}

struct Chain {
    blocks: Vec<ChainBlock>,
    by_hash: HashMap<ContentHash, u64>,
    by_tx: HashMap<TransactionId, u64>,
    journal: Option<Journal>,
}

impl Chain {
    fn new() -> Self {
        Self {
            blocks: vec![ChainBlock::genesis()],
            by_hash: HashMap::new(),
            by_tx: HashMap::new(),
            journal: None,
        }
    }

    /// Rebuild the chain from its block file. Link integrity is not checked
    /// here; `verify_chain` and receipts report broken links.
    fn open(path: &Path) -> Result<Self> {
        let (journal, blocks) = Journal::open::<ChainBlock>(path)?;
        let mut chain = Self {
            blocks: Vec::with_capacity(blocks.len().max(1)),
            by_hash: HashMap::new(),
            by_tx: HashMap::new(),
            journal: Some(journal),
        };

        if blocks.is_empty() {
            chain.push(ChainBlock::genesis())?;
            return Ok(chain);
        }
        for block in blocks {
            if block.height != chain.blocks.len() as u64 {
                return Err(Error::Storage(format!(
                    "{}: expected height {} but found {}",
                    path.display(),
                    chain.blocks.len(),
                    block.height
                )));
            }
            chain.index(block);
        }
        Ok(chain)
    }

    fn index(&mut self, block: ChainBlock) {
        if let (Some(tx), Some(hash)) = (&block.transaction_id, &block.content_hash) {
            self.by_hash.insert(hash.clone(), block.height);
            self.by_tx.insert(tx.clone(), block.height);
        }
        self.blocks.push(block);
    }

    /// Journal the block (when durable), then link it in.
    fn push(&mut self, block: ChainBlock) -> Result<()> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&block).map_err(|e| Error::LedgerUnavailable {
                ledger: LedgerKind::Public.to_string(),
                reason: format!("block write failed: {}", e),
            })?;
        }
        self.index(block);
        Ok(())
    }

    fn tip(&self) -> &ChainBlock {
        // genesis is always present
        &self.blocks[self.blocks.len() - 1]
    }

    fn height(&self) -> u64 {
        self.tip().height
    }

    fn parent_of(&self, block: &ChainBlock) -> Option<&ChainBlock> {
        if block.height == 0 {
            None
        } else {
            self.blocks.get(block.height as usize - 1)
        }
    }
}

/// Public ledger adapter.
pub struct PublicLedger {
    config: PublicLedgerConfig,
    chain: RwLock<Chain>,
    online: AtomicBool,
}

impl PublicLedger {
    /// Create a new adapter with an empty chain.
    pub fn new(config: PublicLedgerConfig) -> Self {
        Self {
            config,
            chain: RwLock::new(Chain::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Open an adapter from configuration, rebuilding the chain from its
    /// block file when a chain path is set.
    pub fn open(config: PublicLedgerConfig) -> Result<Self> {
        let chain = match &config.chain_path {
            Some(path) => {
                let chain = Chain::open(path)?;
                info!(path = %path.display(), height = chain.height(), "public chain loaded");
                chain
            }
            None => Chain::new(),
        };

        Ok(Self {
            config,
            chain: RwLock::new(chain),
            online: AtomicBool::new(true),
        })
    }

    /// RPC endpoint.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Mark the RPC endpoint reachable or unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Current chain height.
    pub async fn height(&self) -> u64 {
        self.chain.read().await.height()
    }

    /// Append blocks carrying no audit transaction, as other network
    /// traffic would. Deepens confirmations of earlier entries.
    pub async fn advance(&self, blocks: u64) -> Result<()> {
        let mut chain = self.chain.write().await;
        for _ in 0..blocks {
            let block = ChainBlock::child(chain.tip(), None, None, ContentHash::zero());
            chain.push(block)?;
        }
        Ok(())
    }

    /// Verify every block links to its parent.
    pub async fn verify_chain(&self) -> bool {
        let chain = self.chain.read().await;
        chain
            .blocks
            .iter()
            .all(|block| block.verify(chain.parent_of(block)))
    }

    /// Transaction ids are derived from the content hash, so they are
    /// unique per hash on this ledger.
    fn transaction_id_for(content_hash: &ContentHash) -> TransactionId {
        let digest = sha3_256_multi(&[b"public-tx:".as_slice(), content_hash.as_bytes()]);
        TransactionId::new(&format!("0x{}", digest.to_hex()))
    }

    fn receipt(&self, chain: &Chain, height: u64) -> Option<LedgerReceipt> {
        let block = chain.blocks.get(height as usize)?;
        let transaction_id = block.transaction_id.clone()?;
        let content_hash = block.content_hash.clone()?;
        let confirmations = chain.height() - block.height + 1;
        let linked = block.verify(chain.parent_of(block));

        Some(LedgerReceipt {
            ledger: LedgerKind::Public,
            transaction_id,
            content_hash,
            confirmed_at: block.timestamp,
            committed: linked && confirmations >= self.config.required_confirmations,
            confirmation: Confirmation::Public {
                block_height: block.height,
                block_hash: block.block_hash.clone(),
                confirmations,
            },
        })
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::LedgerUnavailable {
                ledger: LedgerKind::Public.to_string(),
                reason: format!("rpc endpoint {} unreachable", self.config.endpoint),
            })
        }
    }

    fn reject(&self, reason: String) -> Error {
        Error::RejectedByLedger {
            ledger: LedgerKind::Public.to_string(),
            reason,
        }
    }

    async fn append(&self, content_hash: &ContentHash, payload: &[u8]) -> Result<LedgerReceipt> {
        let mut chain = self.chain.write().await;

        let existing = chain.by_hash.get(content_hash).copied();
        let height = match existing {
            Some(height) => {
                debug!(content_hash = %content_hash, height, "public ledger: hash already anchored");
                height
            }
            None => {
                let transaction_id = Self::transaction_id_for(content_hash);
                let block = ChainBlock::child(
                    chain.tip(),
                    Some(transaction_id),
                    Some(content_hash.clone()),
                    sha3_256(payload),
                );
                let height = block.height;
                chain.push(block)?;
                debug!(content_hash = %content_hash, height, "public ledger: block sealed");
                height
            }
        };

        self.receipt(&chain, height)
            .ok_or_else(|| Error::Internal(format!("block {} carries no transaction", height)))
    }
}

#[async_trait]
impl LedgerAdapter for PublicLedger {
    fn kind(&self) -> LedgerKind {
        LedgerKind::Public
    }

    async fn submit(
        &self,
        content_hash: &ContentHash,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<LedgerReceipt> {
        self.check_online()?;

        if self.config.require_credentials && self.config.api_key.is_none() {
            return Err(self.reject("missing API key".into()));
        }
        if payload.is_empty() {
            return Err(self.reject("empty payload".into()));
        }
        if payload.len() > self.config.max_payload_bytes {
            return Err(self.reject(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.config.max_payload_bytes
            )));
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
        let chain = self.chain.read().await;
        Ok(chain
            .by_tx
            .get(transaction_id)
            .and_then(|&height| self.receipt(&chain, height)))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.online.load(Ordering::SeqCst) && self.verify_chain().await)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.chain.read().await.by_tx.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_submit_and_query() {
        let ledger = PublicLedger::new(PublicLedgerConfig::default());
        let hash = sha3_256(b"event-1");

        let receipt = ledger.submit(&hash, b"payload", TIMEOUT).await.unwrap();
        assert_eq!(receipt.ledger, LedgerKind::Public);
        assert!(receipt.committed);
        assert!(receipt.transaction_id.as_str().starts_with("0x"));

        let queried = ledger.query_receipt(&receipt.transaction_id).await.unwrap();
        assert_eq!(queried, Some(receipt));
    }

    #[tokio::test]
    async fn test_submit_is_idempotent() {
        let ledger = PublicLedger::new(PublicLedgerConfig::default());
        let hash = sha3_256(b"event-1");

        let first = ledger.submit(&hash, b"payload", TIMEOUT).await.unwrap();
        let second = ledger.submit(&hash, b"payload", TIMEOUT).await.unwrap();

        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert_eq!(ledger.height().await, 1);
    }

    #[tokio::test]
    async fn test_confirmations_gate_commitment() {
        let config = PublicLedgerConfig {
            required_confirmations: 3,
            ..Default::default()
        };
        let ledger = PublicLedger::new(config);

        let receipt = ledger
            .submit(&sha3_256(b"event"), b"payload", TIMEOUT)
            .await
            .unwrap();
        assert!(!receipt.committed);

        ledger.advance(2).await.unwrap();
        let queried = ledger
            .query_receipt(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert!(queried.committed);
        match queried.confirmation {
            Confirmation::Public { confirmations, .. } => assert_eq!(confirmations, 3),
            other => panic!("unexpected confirmation {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let config = PublicLedgerConfig {
            require_credentials: true,
            ..Default::default()
        };
        let ledger = PublicLedger::new(config);

        let err = ledger
            .submit(&sha3_256(b"event"), b"payload", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RejectedByLedger { .. }));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let config = PublicLedgerConfig {
            max_payload_bytes: 4,
            ..Default::default()
        };
        let ledger = PublicLedger::new(config);
        let err = ledger
            .submit(&sha3_256(b"event"), b"too large", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RejectedByLedger { .. }));
    }

    #[tokio::test]
    async fn test_chain_verifies() {
        let ledger = PublicLedger::new(PublicLedgerConfig::default());
        for i in 0..5u8 {
            ledger.submit(&sha3_256(&[i]), b"p", TIMEOUT).await.unwrap();
        }
        ledger.advance(2).await.unwrap();

        assert!(ledger.verify_chain().await);
        assert!(ledger.health_check().await.unwrap());
        assert_eq!(ledger.height().await, 7);
        assert_eq!(ledger.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_chain_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublicLedgerConfig {
            chain_path: Some(dir.path().join("chain.jsonl")),
            required_confirmations: 2,
            ..Default::default()
        };

        let receipt = {
            let ledger = PublicLedger::open(config.clone()).unwrap();
            let receipt = ledger
                .submit(&sha3_256(b"event"), b"payload", TIMEOUT)
                .await
                .unwrap();
            ledger.advance(1).await.unwrap();
            receipt
        };

        let reopened = PublicLedger::open(config).unwrap();
        assert_eq!(reopened.height().await, 2);
        assert!(reopened.verify_chain().await);
        let queried = reopened
            .query_receipt(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert!(queried.committed);
        assert_eq!(queried.content_hash, sha3_256(b"event"));

        reopened
            .submit(&sha3_256(b"event"), b"payload", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_edited_block_file_breaks_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");
        let config = PublicLedgerConfig {
            chain_path: Some(path.clone()),
            ..Default::default()
        };

        let receipt = {
            let ledger = PublicLedger::open(config.clone()).unwrap();
            ledger
                .submit(&sha3_256(b"event"), b"payload", TIMEOUT)
                .await
                .unwrap()
        };
        let contents = std::fs::read_to_string(&path).unwrap();
        let forged = contents.replace(&sha3_256(b"payload").to_hex(), &sha3_256(b"forged").to_hex());
        std::fs::write(&path, forged).unwrap();

        let reopened = PublicLedger::open(config).unwrap();
        assert!(!reopened.verify_chain().await);
        let queried = reopened
            .query_receipt(&receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!queried.committed);
    }

    #[tokio::test]
    async fn test_offline_endpoint_is_unavailable() {
        let ledger = PublicLedger::new(PublicLedgerConfig::default());
        ledger.set_online(false);
        let err = ledger
            .query_receipt(&TransactionId::new("0x00"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transaction_id_unique_per_hash() {
        let a = PublicLedger::transaction_id_for(&sha3_256(b"a"));
        let b = PublicLedger::transaction_id_for(&sha3_256(b"b"));
        assert_ne!(a, b);
        assert_eq!(a, PublicLedger::transaction_id_for(&sha3_256(b"a")));
    }
}
