//! Retry execution driven by the failure classifier.

use crate::failure::classifier::{classify_failure, FailureAssessment, RetryPolicy};
use siphon_common::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Cancellation signal observed between attempts and during waits.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation pair; send `true` to cancel.
pub fn cancellation() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Run an operation with classifier-selected retries.
///
/// The operation receives the attempt number. Failures are classified
/// from the error; waits follow the chosen strategy. Cancellation wins
/// over any in-progress wait and propagates as `Error::Cancelled`.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut cancel: Option<CancelSignal>,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        if is_cancelled(&cancel) {
            return Err(Error::Cancelled);
        }

        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => e,
        };

        let assessment = assess(&error);
        let retry_after = match &error {
            Error::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        };

        let Some(delay) = policy.next_delay(&assessment, attempt, retry_after) else {
            return Err(error);
        };

        tracing::debug!(
            attempt,
            category = %assessment.category,
            delay_ms = delay.as_millis() as u64,
            "Retrying after failure"
        );

        if !wait_or_cancel(delay, &mut cancel).await {
            return Err(Error::Cancelled);
        }
        attempt += 1;
    }
}

fn assess(error: &Error) -> FailureAssessment {
    let status = match error {
        Error::Auth(_) => Some(401),
        Error::RateLimited { .. } => Some(429),
        Error::NotFound(_) => Some(404),
        Error::Timeout => Some(408),
        _ => None,
    };
    classify_failure(status, &error.to_string(), None)
}

fn is_cancelled(cancel: &Option<CancelSignal>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Sleep, returning false if cancelled first.
async fn wait_or_cancel(delay: Duration, cancel: &mut Option<CancelSignal>) -> bool {
    let Some(rx) = cancel else {
        tokio::time::sleep(delay).await;
        return true;
    };

    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        changed = rx.changed() => match changed {
            Ok(()) => !*rx.borrow(),
            // Sender dropped: nobody can cancel anymore
            Err(_) => {
                tokio::time::sleep(delay).await;
                true
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let result = {
            let calls = Arc::clone(&calls);
            run_with_retry(&policy, None, move |_attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::External("connection reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
        };

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let result: Result<()> = {
            let calls = Arc::clone(&calls);
            run_with_retry(&policy, None, move |_attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::NotFound("gone".into()))
                }
            })
            .await
        };

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy { max_attempts: 2 };

        let result: Result<()> = {
            let calls = Arc::clone(&calls);
            run_with_retry(&policy, None, move |_attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Timeout)
                }
            })
            .await
        };

        assert!(result.is_err());
        // Initial call plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let (tx, rx) = cancellation();
        let policy = RetryPolicy::default();

        let handle = tokio::spawn(async move {
            run_with_retry(&policy, Some(rx), |_attempt| async {
                Err::<(), _>(Error::RateLimited {
                    retry_after_secs: 30,
                })
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
