// Timeout-and-retry wrapper for startup calls.
//
// The session check and the first feed fetch are raced against a fixed
// timeout. A timeout or an error counts as a failed attempt; attempts are
// separated by a fixed backoff. When the budget is spent the caller gets
// an EngagementError and degrades to the guest / empty state instead of
// hanging.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::EngagementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// 3 s per attempt, 3 attempts, 500 ms apart.
    pub fn session_check() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    /// 5 s per attempt, 3 attempts, 500 ms apart.
    pub fn feed_fetch() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

enum Failure {
    TimedOut,
    Failed(anyhow::Error),
}

/// Run `operation` under `policy`.
///
/// Returns `RemoteTimeout` if the last attempt timed out, otherwise
/// `RemoteReadFailure` carrying the last error.
pub async fn with_timeout_retry<F, Fut, T>(
    operation: &'static str,
    policy: &RetryPolicy,
    f: F,
) -> Result<T, EngagementError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last = Failure::TimedOut;

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(operation, attempt, attempts, error = %err, "Remote call failed");
                last = Failure::Failed(err);
            }
            Err(_) => {
                warn!(
                    operation,
                    attempt,
                    attempts,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    "Remote call timed out"
                );
                last = Failure::TimedOut;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(match last {
        Failure::TimedOut => EngagementError::RemoteTimeout {
            operation,
            attempts,
        },
        Failure::Failed(err) => EngagementError::read(operation, err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            attempts: 3,
            backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_timeout_retry("probe", &fast_policy(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_timeout_retry("probe", &fast_policy(), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("transient");
                }
                Ok(1)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = with_timeout_retry("session check", &fast_policy(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, anyhow::Error>(())
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EngagementError::RemoteTimeout {
                operation: "session check",
                attempts: 3
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_error_reports_last_error() {
        let err = with_timeout_retry("feed fetch", &fast_policy(), || async {
            Err::<(), _>(anyhow::anyhow!("503"))
        })
        .await
        .unwrap_err();
        match err {
            EngagementError::RemoteReadFailure { operation, message } => {
                assert_eq!(operation, "feed fetch");
                assert_eq!(message, "503");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
