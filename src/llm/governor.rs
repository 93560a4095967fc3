//! Leaky-bucket token-rate governor shared by all analysis sessions

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    available: f64,
    last_refill: Instant,
}

/// Process-wide token-rate limiter
///
/// Every session draws from the same bucket, so concurrent sessions share
/// the provider's token budget instead of multiplying it.
#[derive(Debug)]
pub struct RateGovernor {
    capacity: f64,
    refill_per_s: f64,
    state: Mutex<BucketState>,
}

impl RateGovernor {
    /// Bucket holding `capacity` tokens, refilled at `refill_per_s`
    pub fn new(capacity: f64, refill_per_s: f64) -> Self {
        Self {
            capacity,
            refill_per_s,
            state: Mutex::new(BucketState {
                available: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Governor that never blocks (tests, offline runs)
    pub fn unlimited() -> Self {
        Self::new(f64::MAX, 0.0)
    }

    /// Wait until `tokens` can be drawn from the bucket
    pub async fn acquire(&self, tokens: f64) {
        let tokens = tokens.min(self.capacity);
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.available = (state.available + elapsed * self.refill_per_s).min(self.capacity);
                state.last_refill = now;

                if state.available >= tokens {
                    state.available -= tokens;
                    return;
                }
                if self.refill_per_s <= 0.0 {
                    // bucket never refills; draw what's there and move on
                    state.available = 0.0;
                    return;
                }
                Duration::from_secs_f64((tokens - state.available) / self.refill_per_s)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_never_blocks() {
        let governor = RateGovernor::unlimited();
        let start = std::time::Instant::now();
        for _ in 0..100 {
            governor.acquire(1_000_000.0).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let governor = RateGovernor::new(10.0, 10.0);
        governor.acquire(10.0).await; // drains the bucket

        let start = Instant::now();
        governor.acquire(5.0).await; // needs 0.5 s of refill
        assert!(start.elapsed() >= Duration::from_millis(490));
    }
}
