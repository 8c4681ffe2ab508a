//! Audit trail generation.
//!
//! Trails are built from persisted records only. Records are ordered by
//! creation time, ties broken by content hash, so the same range always
//! yields the same sequence.

use crate::audit::filter::TrailFilter;
use crate::audit::record::{AuditRecord, AuditRecordSummary};
use crate::audit::store::AuditStore;
use crate::core::{from_millis, Error, Result, Timestamp};
use std::sync::Arc;
use tracing::debug;

/// A finite, ordered trail of audit records.
///
/// The whole range is read from the store and held in memory when the
/// trail is generated; it is not a lazy cursor. Iteration walks that copy
/// without consuming it, so `iter()` can be called again to start over,
/// and records stored after generation do not appear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
}

impl AuditTrail {
    /// Walk the trail in order.
    pub fn iter(&self) -> std::slice::Iter<'_, AuditRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Compact summaries in trail order.
    pub fn summaries(&self) -> Vec<AuditRecordSummary> {
        self.iter().map(AuditRecord::summary).collect()
    }

    /// Take ownership of the records.
    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a AuditTrail {
    type Item = &'a AuditRecord;
    type IntoIter = std::slice::Iter<'a, AuditRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-only query interface over an audit store.
#[derive(Clone)]
pub struct AuditTrailQuery {
    store: Arc<dyn AuditStore>,
}

impl AuditTrailQuery {
    /// Create a query over the given store.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Records created within `[start, end]`, in trail order.
    pub async fn generate(&self, start: Timestamp, end: Timestamp) -> Result<AuditTrail> {
        if start > end {
            return Err(Error::Validation(format!(
                "trail range start {} is after end {}",
                start, end
            )));
        }

        let mut records = self.store.range(start, end).await?;
        records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        debug!(%start, %end, records = records.len(), "audit trail generated");
        Ok(AuditTrail { records })
    }

    /// Like [`generate`](Self::generate), keeping only records that match
    /// `filter`.
    pub async fn generate_filtered(
        &self,
        start: Timestamp,
        end: Timestamp,
        filter: &TrailFilter,
    ) -> Result<AuditTrail> {
        let trail = self.generate(start, end).await?;
        let matching = trail.records.into_iter().filter(|r| filter.matches(r));
        let records = match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        };
        Ok(AuditTrail { records })
    }

    /// Summaries for records created within `[start_ms, end_ms]` (epoch millis).
    pub async fn generate_audit_trail(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<AuditRecordSummary>> {
        let start = from_millis(start_ms)
            .ok_or_else(|| Error::Validation(format!("start {} is out of range", start_ms)))?;
        let end = from_millis(end_ms)
            .ok_or_else(|| Error::Validation(format!("end {} is out of range", end_ms)))?;
        Ok(self.generate(start, end).await?.summaries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::{VerificationOutcome, VerificationStatus};
    use crate::audit::store::MemoryAuditStore;
    use crate::core::now;
    use crate::events::{AccessDecision, AuditEvent, Decision, EventKind};
    use crate::hashing::CanonicalHasher;

    fn record(subject: &str, sequence: u64, created_ms: i64, status: VerificationStatus) -> AuditRecord {
        let event: AuditEvent = AccessDecision::new(subject, "res", "read", Decision::Permit).into();
        AuditRecord {
            sequence,
            content_hash: CanonicalHasher::hash(&event).unwrap(),
            event,
            permissioned_receipt: None,
            public_receipt: None,
            outcome: VerificationOutcome {
                status,
                checked_at: now(),
                latency_ms: 0,
                permissioned_confirmed: status != VerificationStatus::Failed,
                public_confirmed: status == VerificationStatus::Verified,
                hash_mismatch: false,
                detail: None,
            },
            submission_errors: Vec::new(),
            created_at: from_millis(created_ms).unwrap(),
        }
    }

    async fn query_with(records: Vec<AuditRecord>) -> AuditTrailQuery {
        let store = Arc::new(MemoryAuditStore::new());
        for r in records {
            store.insert(r).await.unwrap();
        }
        AuditTrailQuery::new(store)
    }

    #[tokio::test]
    async fn test_trail_ordered_by_time_then_hash() {
        let query = query_with(vec![
            record("c", 3, 300, VerificationStatus::Verified),
            record("a", 1, 100, VerificationStatus::Verified),
            record("b1", 2, 200, VerificationStatus::Partial),
            record("b2", 4, 200, VerificationStatus::Verified),
        ])
        .await;

        let trail = query.generate_audit_trail(0, 1_000).await.unwrap();
        assert_eq!(trail.len(), 4);
        assert_eq!(trail[0].subject, "a");
        assert_eq!(trail[3].subject, "c");
        assert_eq!(trail[1].created_at_ms, 200);
        assert!(trail[1].content_hash < trail[2].content_hash);
    }

    #[tokio::test]
    async fn test_trail_is_restartable() {
        let query = query_with(vec![
            record("a", 1, 100, VerificationStatus::Verified),
            record("b", 2, 200, VerificationStatus::Verified),
        ])
        .await;

        let trail = query
            .generate(from_millis(0).unwrap(), from_millis(1_000).unwrap())
            .await
            .unwrap();
        let first: Vec<u64> = trail.iter().map(|r| r.sequence).collect();
        let second: Vec<u64> = (&trail).into_iter().map(|r| r.sequence).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_trail_is_a_snapshot_of_the_range() {
        let store = Arc::new(MemoryAuditStore::new());
        store
            .insert(record("a", 1, 100, VerificationStatus::Verified))
            .await
            .unwrap();
        let query = AuditTrailQuery::new(store.clone());

        let trail = query
            .generate(from_millis(0).unwrap(), from_millis(1_000).unwrap())
            .await
            .unwrap();
        store
            .insert(record("b", 2, 200, VerificationStatus::Verified))
            .await
            .unwrap();

        assert_eq!(trail.iter().count(), 1);
        assert_eq!(query.generate_audit_trail(0, 1_000).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_range_bounds_are_inclusive() {
        let query = query_with(vec![
            record("a", 1, 100, VerificationStatus::Verified),
            record("b", 2, 200, VerificationStatus::Verified),
            record("c", 3, 300, VerificationStatus::Verified),
        ])
        .await;

        let trail = query.generate_audit_trail(100, 200).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(query.generate_audit_trail(400, 500).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_is_validation_error() {
        let query = query_with(Vec::new()).await;
        let err = query.generate_audit_trail(500, 100).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_filtered_trail() {
        let query = query_with(vec![
            record("a", 1, 100, VerificationStatus::Verified),
            record("b", 2, 200, VerificationStatus::Partial),
            record("c", 3, 300, VerificationStatus::Partial),
        ])
        .await;
        let start = from_millis(0).unwrap();
        let end = from_millis(1_000).unwrap();

        let partial = query
            .generate_filtered(
                start,
                end,
                &TrailFilter::new().by_status(VerificationStatus::Partial),
            )
            .await
            .unwrap();
        assert_eq!(partial.len(), 2);

        let limited = query
            .generate_filtered(
                start,
                end,
                &TrailFilter::new()
                    .by_kind(EventKind::AccessDecision)
                    .with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(limited.summaries()[0].subject, "a");
        assert_eq!(limited.len(), 1);
    }
}
