//! A minimum-inter-call-delay rate limiter.
//!
//! Deliberately hand-rolled rather than pulling in a token-bucket crate:
//! the policy here is a single scalar minimum delay between calls, shared
//! process-wide across every call a client makes, not a windowed quota.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Process-wide singleton per client kind. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Sleeps out whatever remains of `min_delay` since the last call, then
    /// records this call's start time. Every outbound call passes through
    /// this before going in-flight.
    pub async fn wait_if_needed(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_never_sleeps() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_call_waits_out_the_remaining_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.wait_if_needed().await;
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn shared_clone_observes_the_same_last_call() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let clone = limiter.clone();
        limiter.wait_if_needed().await;
        let start = Instant::now();
        clone.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
