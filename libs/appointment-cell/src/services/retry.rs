// libs/appointment-cell/src/services/retry.rs
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use shared_models::SchedulingError;

/// Bounds and retry budget for storage calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff_step: Duration::from_millis(100),
        }
    }

    /// Runs `attempt` under the storage timeout. Transient failures (including
    /// the timeout itself) are retried with linear backoff; domain errors are
    /// returned on first sight.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, SchedulingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SchedulingError>>,
    {
        let mut tries = 0u32;
        loop {
            tries += 1;
            let result = match timeout(self.timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(SchedulingError::TransientStorage(format!(
                    "{} timed out after {:?}",
                    operation, self.timeout
                ))),
            };

            match result {
                Err(err) if err.is_transient() && tries <= self.max_retries => {
                    warn!(
                        "{} failed transiently ({}), retrying attempt {}/{}",
                        operation, err, tries, self.max_retries
                    );
                    sleep(self.backoff_step * tries).await;
                }
                Err(err) if err.is_transient() => {
                    error!("{} gave up after {} attempts: {}", operation, tries, err);
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 2,
            backoff_step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy()
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SchedulingError::TransientStorage("busy".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy()
            .run("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SchedulingError::TransientStorage("down".into()))
            })
            .await;

        assert!(matches!(result, Err(SchedulingError::TransientStorage(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy()
            .run("full", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SchedulingError::CapacityExceeded { slot_id: "x".into() })
            })
            .await;

        assert!(matches!(result, Err(SchedulingError::CapacityExceeded { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_calls_time_out() {
        let result: Result<(), _> = RetryPolicy {
            max_retries: 0,
            ..policy()
        }
        .run("slow", || async {
            sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(SchedulingError::TransientStorage(_))));
    }
}
