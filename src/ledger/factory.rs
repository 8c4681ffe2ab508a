//! Ledger adapter factory.
//!
//! Creates both ledger adapters from configuration.

use crate::config::AuditConfig;
use crate::core::Result;
use crate::ledger::adapter::LedgerAdapter;
use crate::ledger::permissioned::PermissionedLedger;
use crate::ledger::public::PublicLedger;
use std::sync::Arc;
use tracing::info;

/// The two ledgers every record is written to.
#[derive(Clone)]
pub struct LedgerPair {
    /// Ledger A
    pub permissioned: Arc<dyn LedgerAdapter>,
    /// Ledger B
    pub public: Arc<dyn LedgerAdapter>,
}

/// Create both ledger adapters from configuration.
///
/// Ledgers with configured paths replay their files. Returns Arc-wrapped
/// adapters for sharing between the recorder and its verifier.
pub fn create_ledger_adapters(config: &AuditConfig) -> Result<LedgerPair> {
    config.validate()?;

    let permissioned = PermissionedLedger::open(config.permissioned.clone())?;
    let public = PublicLedger::open(config.public.clone())?;
    info!(
        permissioned = %permissioned.endpoint(),
        public = %public.endpoint(),
        "ledger adapters created"
    );

    Ok(LedgerPair {
        permissioned: Arc::new(permissioned),
        public: Arc::new(public),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::ledger::adapter::LedgerKind;

    #[test]
    fn test_factory_creates_both_kinds() {
        let pair = create_ledger_adapters(&AuditConfig::default()).unwrap();
        assert_eq!(pair.permissioned.kind(), LedgerKind::Permissioned);
        assert_eq!(pair.public.kind(), LedgerKind::Public);
    }

    #[tokio::test]
    async fn test_factory_reopens_durable_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig::default().with_store_path(dir.path().join("records.jsonl"));
        let hash = crate::crypto::sha3_256(b"event");
        let timeout = std::time::Duration::from_secs(1);

        let (a, b) = {
            let pair = create_ledger_adapters(&config).unwrap();
            let a = pair.permissioned.submit(&hash, b"p", timeout).await.unwrap();
            let b = pair.public.submit(&hash, b"p", timeout).await.unwrap();
            (a, b)
        };

        let pair = create_ledger_adapters(&config).unwrap();
        let a2 = pair.permissioned.query_receipt(&a.transaction_id).await.unwrap();
        let b2 = pair.public.query_receipt(&b.transaction_id).await.unwrap();
        assert!(a2.map(|r| r.committed).unwrap_or(false));
        assert!(b2.map(|r| r.committed).unwrap_or(false));
    }

    #[test]
    fn test_factory_rejects_invalid_config() {
        let mut config = AuditConfig::default();
        config.public.endpoint = String::new();
        let err = create_ledger_adapters(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
