//! Append-only audit record stores.
//!
//! At most one record per content hash; a second insert for the same hash
//! hands back the record already stored. Nothing here updates or deletes a
//! stored record.

use crate::audit::record::AuditRecord;
use crate::core::{ContentHash, Error, Result, Timestamp, TransactionId};
use crate::hashing::CanonicalHasher;
use async_trait::async_trait;
use crate::journal::Journal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Result of an insert.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    /// The record was appended
    Inserted,
    /// A record for this content hash already existed; it is returned unchanged
    Existing(AuditRecord),
}

/// Durable store of finalized audit records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record unless one exists for its content hash.
    async fn insert(&self, record: AuditRecord) -> Result<InsertOutcome>;

    /// Read a record by content hash.
    async fn get(&self, content_hash: &ContentHash) -> Result<Option<AuditRecord>>;

    /// Find the record holding a ledger transaction id.
    async fn find_by_transaction(&self, transaction_id: &TransactionId)
        -> Result<Option<AuditRecord>>;

    /// Records created within `[start, end]`, ordered by creation time then
    /// content hash.
    async fn range(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AuditRecord>>;

    /// Number of records.
    async fn count(&self) -> Result<u64>;

    /// Highest sequence number stored, if any.
    async fn last_sequence(&self) -> Result<Option<u64>>;
}

/// In-memory index shared by both store implementations.
#[derive(Default)]
struct RecordIndex {
    records: Vec<AuditRecord>,
    by_hash: HashMap<ContentHash, usize>,
    by_tx: HashMap<TransactionId, usize>,
}

impl RecordIndex {
    fn existing(&self, content_hash: &ContentHash) -> Option<&AuditRecord> {
        self.by_hash.get(content_hash).map(|&idx| &self.records[idx])
    }

    fn push(&mut self, record: AuditRecord) {
        let idx = self.records.len();
        self.by_hash.insert(record.content_hash.clone(), idx);
        for receipt in [&record.permissioned_receipt, &record.public_receipt]
            .into_iter()
            .flatten()
        {
            self.by_tx.insert(receipt.transaction_id.clone(), idx);
        }
        self.records.push(record);
    }

    fn get(&self, content_hash: &ContentHash) -> Option<AuditRecord> {
        self.existing(content_hash).cloned()
    }

    fn find_by_transaction(&self, transaction_id: &TransactionId) -> Option<AuditRecord> {
        self.by_tx
            .get(transaction_id)
            .map(|&idx| self.records[idx].clone())
    }

    fn range(&self, start: Timestamp, end: Timestamp) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> = self
            .records
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        records
    }

    fn last_sequence(&self) -> Option<u64> {
        self.records.iter().map(|r| r.sequence).max()
    }
}

/// Volatile store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryAuditStore {
    index: RwLock<RecordIndex>,
}

impl MemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: AuditRecord) -> Result<InsertOutcome> {
        let mut index = self.index.write().await;
        if let Some(existing) = index.existing(&record.content_hash) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        index.push(record);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, content_hash: &ContentHash) -> Result<Option<AuditRecord>> {
        Ok(self.index.read().await.get(content_hash))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<AuditRecord>> {
        Ok(self.index.read().await.find_by_transaction(transaction_id))
    }

    async fn range(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AuditRecord>> {
        Ok(self.index.read().await.range(start, end))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.index.read().await.records.len() as u64)
    }

    async fn last_sequence(&self) -> Result<Option<u64>> {
        Ok(self.index.read().await.last_sequence())
    }
}

struct JsonlInner {
    /// None when opened read-only
    journal: Option<Journal>,
    index: RecordIndex,
}

/// Append-only JSON-lines store, durable across restarts.
///
/// Each record is one line, flushed and synced before the insert returns.
/// On open, every line is re-hashed; a line whose stored hash does not
/// match its event fails the open. An unterminated last line left by an
/// interrupted append is dropped with a warning.
pub struct JsonlAuditStore {
    path: PathBuf,
    inner: Mutex<JsonlInner>,
}

impl JsonlAuditStore {
    /// Open (or create) the store at `path` and load existing records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (journal, records) = Journal::open::<AuditRecord>(&path)?;
        let index = Self::index(records)?;

        info!(
            path = %path.display(),
            records = index.records.len(),
            "audit store opened"
        );

        Ok(Self {
            path,
            inner: Mutex::new(JsonlInner {
                journal: Some(journal),
                index,
            }),
        })
    }

    /// Open an existing store for reading only. Nothing is created or
    /// repaired; a missing file is `NotFound` and inserts fail.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "no audit store at {}",
                path.display()
            )));
        }
        let index = Self::index(Journal::read::<AuditRecord>(&path)?)?;
        debug!(path = %path.display(), records = index.records.len(), "audit store opened read-only");

        Ok(Self {
            path,
            inner: Mutex::new(JsonlInner {
                journal: None,
                index,
            }),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index(records: Vec<AuditRecord>) -> Result<RecordIndex> {
        let mut index = RecordIndex::default();
        for (n, record) in records.into_iter().enumerate() {
            let derived = CanonicalHasher::hash(&record.event)?;
            if derived != record.content_hash {
                return Err(Error::Storage(format!(
                    "record {}: stored hash {} does not match event hash {}",
                    n + 1,
                    record.content_hash,
                    derived
                )));
            }
            if index.existing(&record.content_hash).is_some() {
                return Err(Error::Storage(format!(
                    "record {}: duplicate record for {}",
                    n + 1,
                    record.content_hash
                )));
            }
            index.push(record);
        }
        Ok(index)
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn insert(&self, record: AuditRecord) -> Result<InsertOutcome> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.index.existing(&record.content_hash) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        let journal = inner.journal.as_mut().ok_or_else(|| {
            Error::Storage(format!("{} is open read-only", self.path.display()))
        })?;
        journal.append(&record)?;

        debug!(content_hash = %record.content_hash, sequence = record.sequence, "audit record appended");
        inner.index.push(record);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, content_hash: &ContentHash) -> Result<Option<AuditRecord>> {
        Ok(self.inner.lock().await.index.get(content_hash))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<AuditRecord>> {
        Ok(self.inner.lock().await.index.find_by_transaction(transaction_id))
    }

    async fn range(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AuditRecord>> {
        Ok(self.inner.lock().await.index.range(start, end))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.lock().await.index.records.len() as u64)
    }

    async fn last_sequence(&self) -> Result<Option<u64>> {
        Ok(self.inner.lock().await.index.last_sequence())
    }
}
