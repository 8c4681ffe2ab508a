//! Per-ledger submission retry.
//!
//! Transient faults (`LedgerUnavailable`, `SubmissionTimeout`) are retried
//! with exponential backoff; everything else fails on the first attempt.
//! Attempts against one adapter run strictly one after another: a timed-out
//! attempt is dropped before the backoff sleep begins.

use crate::core::{ContentHash, Error, Result};
use crate::ledger::{LedgerAdapter, LedgerReceipt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for ledger submissions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds)
    pub backoff_base_ms: u64,
    /// Cap on any single delay (milliseconds)
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempts and base delay.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base_ms: backoff_base.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Final failure of a submission after the retry budget.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryFailure {
    /// Last error observed
    pub error: Error,
    /// Attempts made
    pub attempts: u32,
}

/// Submit to one adapter, retrying transient faults per the policy.
///
/// Returns the receipt and the number of attempts it took.
pub async fn submit_with_retry(
    adapter: &dyn LedgerAdapter,
    content_hash: &ContentHash,
    payload: &[u8],
    timeout: Duration,
    policy: &RetryPolicy,
) -> std::result::Result<(LedgerReceipt, u32), RetryFailure> {
    let ledger = adapter.kind();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result: Result<LedgerReceipt> =
            match tokio::time::timeout(timeout, adapter.submit(content_hash, payload, timeout)).await
            {
                Ok(result) => result,
                // adapter ignored its own deadline
                Err(_) => Err(Error::SubmissionTimeout {
                    ledger: ledger.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

        match result {
            Ok(receipt) => {
                debug!(%ledger, %content_hash, attempt, "submission accepted");
                return Ok((receipt, attempt));
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    %ledger,
                    %content_hash,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient submission failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                warn!(%ledger, %content_hash, attempt, error = %error, "submission failed");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{now, TransactionId};
    use crate::ledger::{Confirmation, LedgerKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with the given error.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: Error,
    }

    impl Flaky {
        fn new(failures: u32, error: Error) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            }
        }
    }

    #[async_trait]
    impl LedgerAdapter for Flaky {
        fn kind(&self) -> LedgerKind {
            LedgerKind::Public
        }

        async fn submit(
            &self,
            content_hash: &ContentHash,
            _payload: &[u8],
            _timeout: Duration,
        ) -> Result<LedgerReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(self.error.clone());
            }
            Ok(LedgerReceipt {
                ledger: LedgerKind::Public,
                transaction_id: TransactionId::new("0xabc"),
                content_hash: content_hash.clone(),
                confirmed_at: now(),
                committed: true,
                confirmation: Confirmation::Public {
                    block_height: 1,
                    block_hash: ContentHash::zero(),
                    confirmations: 1,
                },
            })
        }

        async fn query_receipt(&self, _: &TransactionId) -> Result<Option<LedgerReceipt>> {
            Ok(None)
        }
    }

    fn unavailable() -> Error {
        Error::LedgerUnavailable {
            ledger: "public".into(),
            reason: "connection reset".into(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_base_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_recovered() {
        let adapter = Flaky::new(2, unavailable());
        let policy = RetryPolicy::new(3, Duration::from_millis(50));

        let (receipt, attempts) = submit_with_retry(
            &adapter,
            &ContentHash::zero(),
            b"p",
            Duration::from_secs(1),
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert!(receipt.committed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_surfaces_last_error() {
        let adapter = Flaky::new(u32::MAX, unavailable());
        let policy = RetryPolicy::new(4, Duration::from_millis(10));

        let failure = submit_with_retry(
            &adapter,
            &ContentHash::zero(),
            b"p",
            Duration::from_secs(1),
            &policy,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 4);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
        assert!(matches!(failure.error, Error::LedgerUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_not_retried() {
        let adapter = Flaky::new(
            u32::MAX,
            Error::RejectedByLedger {
                ledger: "public".into(),
                reason: "malformed".into(),
            },
        );

        let failure = submit_with_retry(
            &adapter,
            &ContentHash::zero(),
            b"p",
            Duration::from_secs(1),
            &RetryPolicy::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }
}
