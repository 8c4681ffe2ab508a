//! Scripted ledger adapter shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dual_ledger_audit::audit::{AuditRecorder, MemoryAuditStore, RecorderConfig, RetryPolicy};
use dual_ledger_audit::core::{now, ContentHash, Error, Result, TransactionId};
use dual_ledger_audit::crypto::sha3_256;
use dual_ledger_audit::ledger::{Confirmation, LedgerAdapter, LedgerKind, LedgerReceipt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the scripted ledger behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    /// Accept and report committed
    Accept,
    /// Accept but never finalize
    Unfinalized,
    /// Every call fails as unreachable
    Unavailable,
    /// Submissions never answer within the timeout
    Hang,
    /// Accept, but the receipt names different content
    WrongHash,
    /// Re-queries report different content than was submitted
    Tampered,
}

pub struct ScriptedLedger {
    kind: LedgerKind,
    script: Mutex<Script>,
    attempts: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    receipts: Mutex<HashMap<TransactionId, LedgerReceipt>>,
}

struct InFlight<'a>(&'a ScriptedLedger);

impl<'a> InFlight<'a> {
    fn enter(ledger: &'a ScriptedLedger) -> Self {
        let now = ledger.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        ledger.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(ledger)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedLedger {
    pub fn new(kind: LedgerKind, script: Script) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script),
            attempts: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            receipts: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    fn script(&self) -> Script {
        *self.script.lock().unwrap()
    }

    /// Submission attempts seen, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Most submissions observed running at the same time.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> usize {
        self.receipts.lock().unwrap().len()
    }

    fn unavailable(&self) -> Error {
        Error::LedgerUnavailable {
            ledger: self.kind.to_string(),
            reason: "scripted outage".into(),
        }
    }

    fn confirmation(&self, n: u64) -> Confirmation {
        match self.kind {
            LedgerKind::Permissioned => Confirmation::Permissioned {
                channel: "test-channel".into(),
                block_number: n,
                endorsement: String::new(),
            },
            LedgerKind::Public => Confirmation::Public {
                block_height: n,
                block_hash: sha3_256(&n.to_be_bytes()),
                confirmations: 1,
            },
        }
    }
}

#[async_trait]
impl LedgerAdapter for ScriptedLedger {
    fn kind(&self) -> LedgerKind {
        self.kind
    }

    async fn submit(
        &self,
        content_hash: &ContentHash,
        _payload: &[u8],
        timeout: Duration,
    ) -> Result<LedgerReceipt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(self);

        let script = self.script();
        match script {
            Script::Unavailable => return Err(self.unavailable()),
            Script::Hang => {
                tokio::time::sleep(timeout * 4).await;
                return Err(self.unavailable());
            }
            _ => {}
        }

        let transaction_id =
            TransactionId::new(&format!("{}-{}", self.kind, &content_hash.to_hex()[..16]));
        let mut receipts = self.receipts.lock().unwrap();
        if let Some(existing) = receipts.get(&transaction_id) {
            return Ok(existing.clone());
        }

        let receipt = LedgerReceipt {
            ledger: self.kind,
            transaction_id: transaction_id.clone(),
            content_hash: if script == Script::WrongHash {
                sha3_256(b"someone else's content")
            } else {
                content_hash.clone()
            },
            confirmed_at: now(),
            committed: script != Script::Unfinalized,
            confirmation: self.confirmation(receipts.len() as u64 + 1),
        };
        receipts.insert(transaction_id, receipt.clone());
        Ok(receipt)
    }

    async fn query_receipt(&self, transaction_id: &TransactionId) -> Result<Option<LedgerReceipt>> {
        let script = self.script();
        if script == Script::Unavailable {
            return Err(self.unavailable());
        }

        let found = self.receipts.lock().unwrap().get(transaction_id).cloned();
        Ok(found.map(|mut receipt| {
            if script == Script::Tampered {
                receipt.content_hash = sha3_256(b"rewritten");
            }
            receipt
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.script() != Script::Unavailable)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries() as u64)
    }
}

pub fn test_config() -> RecorderConfig {
    RecorderConfig {
        call_timeout: Duration::from_millis(200),
        verification_budget: Duration::from_millis(200),
        retry: RetryPolicy::new(3, Duration::from_millis(10)),
    }
}

pub struct Harness {
    pub permissioned: Arc<ScriptedLedger>,
    pub public: Arc<ScriptedLedger>,
    pub recorder: Arc<AuditRecorder>,
}

pub async fn harness(permissioned: Script, public: Script) -> Harness {
    let a = ScriptedLedger::new(LedgerKind::Permissioned, permissioned);
    let b = ScriptedLedger::new(LedgerKind::Public, public);
    let recorder = AuditRecorder::new(
        a.clone(),
        b.clone(),
        Arc::new(MemoryAuditStore::new()),
        test_config(),
    )
    .await
    .unwrap();

    Harness {
        permissioned: a,
        public: b,
        recorder: Arc::new(recorder),
    }
}
