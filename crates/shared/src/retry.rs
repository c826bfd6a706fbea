//! Bounded retry for transient store failures
//!
//! Wraps an operation in a fixed-count exponential backoff. The helper
//! does not distinguish transient from permanent errors, so it must only
//! wrap operations that are safe to repeat — in practice the atomic
//! upserts and status projections, which converge to the same terminal
//! state however many times they run.

use std::future::Future;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

const MAX_ATTEMPTS: usize = 3;

/// Retry an idempotent database operation with exponential backoff.
///
/// Delays double from 100ms with jitter: ~100ms, ~200ms.
pub async fn retry_db<F, Fut, T>(operation: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(50)
        .map(jitter)
        .take(MAX_ATTEMPTS - 1);

    Retry::spawn(strategy, operation).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = calls.clone();

        let result = retry_db(move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, sqlx::Error>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = calls.clone();

        let result = retry_db(move || {
            let calls = calls_in_op.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), _> = retry_db(move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(sqlx::Error::PoolTimedOut)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
