use std::time::Duration;

use crate::error::ClientError;

/// Exponential backoff bounded by `max_attempts`/`max_interval` (§4.2).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_interval: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, max_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_interval,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(200);
        let factor = 2u32.saturating_pow(attempt.min(16));
        (base.saturating_mul(factor)).min(self.max_interval)
    }

    /// Run `op` up to `max_attempts` times, sleeping with exponential
    /// backoff between attempts. Returns the first `Ok`, or the last `Err`
    /// once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 >= self.max_attempts || !is_retryable(&err) => {
                    return Err(err);
                },
                Err(err) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(op = op_name, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}

fn is_retryable(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Transport { .. } | ClientError::RateLimited(_) | ClientError::Orchestrator { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);
        let result = policy
            .run("test_op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ClientError::Transport {
                            op: "test_op",
                            message: "boom".into(),
                        })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let attempts = AtomicU32::new(0);
        let result: Result<(), ClientError> = policy
            .run("test_op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(ClientError::Transport {
                        op: "test_op",
                        message: "boom".into(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(5));
        let attempts = AtomicU32::new(0);
        let result: Result<(), ClientError> = policy
            .run("test_op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err(ClientError::Auth("expired".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
