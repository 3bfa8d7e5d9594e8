use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A token bucket of capacity `burst`, refilled continuously at
/// `requests_per_second` (§4.2). Callers block up to a deadline; exhaustion
/// past the deadline is the caller's responsibility to map to a transport
/// failure.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(burst: u32, requests_per_second: f64) -> Self {
        Self {
            capacity: f64::from(burst.max(1)),
            refill_per_sec: requests_per_second.max(0.001),
            state: Mutex::new(State {
                tokens: f64::from(burst.max(1)),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Block until one token is available or `deadline` elapses, whichever
    /// comes first. Returns `false` if the deadline was hit first.
    pub async fn acquire(&self, deadline: Duration) -> bool {
        let start = Instant::now();
        loop {
            {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return true;
                }
            }
            if start.elapsed() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_burst_immediately() {
        let limiter = RateLimiter::new(3, 1.0);
        for _ in 0..3 {
            assert!(limiter.acquire(Duration::from_millis(50)).await);
        }
    }

    #[tokio::test]
    async fn blocks_past_burst_until_deadline() {
        let limiter = RateLimiter::new(1, 0.001);
        assert!(limiter.acquire(Duration::from_millis(10)).await);
        assert!(!limiter.acquire(Duration::from_millis(50)).await);
    }
}
