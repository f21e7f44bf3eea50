// Minimum-interval rate limiter shared by every labeling worker.
//
// Each caller reserves the next free slot under the lock, then sleeps
// outside it. Slots are handed out at least `interval` apart, so however
// many workers are in flight, consecutive calls to the completion API are
// spaced by the configured delay.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
}

struct RateLimiterInner {
    /// Minimum time between requests
    interval: Duration,
    /// Slot handed to the most recent caller
    last_slot: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                interval,
                last_slot: None,
            })),
        }
    }

    /// Wait until this caller's slot comes up.
    pub async fn acquire(&self) {
        let slot = {
            let mut inner = self.inner.lock().await;
            let now = Instant::now();
            let slot = match inner.last_slot {
                Some(last) => (last + inner.interval).max(now),
                None => now,
            };
            inner.last_slot = Some(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
