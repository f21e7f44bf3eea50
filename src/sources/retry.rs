// Bounded retry with exponential backoff for source requests.
//
// Rate-limit and transient errors are retried up to `max_retries` times
// with exponentially increasing, jittered delays. A provider-supplied
// Retry-After wins over the computed backoff. Fatal errors are returned
// immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::SourceError;

/// Retry policy for a single source request.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base: Duration,
    /// Cap on any single delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// +/- 25% jitter so concurrent connectors don't retry in lockstep.
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..1.25);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Run `operation`, retrying retryable source errors per `backoff`.
pub async fn with_retry<F, Fut, T>(backoff: &Backoff, operation: F) -> Result<T, SourceError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= backoff.max_retries {
                    return Err(err);
                }

                attempt += 1;

                let delay = match &err {
                    SourceError::RateLimited {
                        retry_after: Some(after),
                        ..
                    } => (*after).min(backoff.max),
                    _ => jittered(backoff.delay_for(attempt)),
                };

                warn!(
                    error = %err,
                    attempt = attempt,
                    max_retries = backoff.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Source request failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> Backoff {
        Backoff {
            max_retries: 3,
            base: Duration::from_millis(1),
            max: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let backoff = Backoff {
            max_retries: 10,
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
        assert_eq!(backoff.delay_for(10), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(40), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SourceError::Transient {
                    source_name: "test",
                    message: "503".into(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::RateLimited {
                source_name: "test",
                retry_after: None,
            })
        })
        .await;

        assert!(matches!(result, Err(SourceError::RateLimited { .. })));
        // One initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Fatal {
                source_name: "test",
                message: "401".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
