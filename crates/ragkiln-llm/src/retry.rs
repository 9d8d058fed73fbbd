//! Retry with exponential backoff, bounded by a max attempt count
//!.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Runs `operation` up to `config.max_attempts` times, sleeping an
/// exponentially growing delay between attempts, as long as `is_retryable`
/// says the error is worth retrying. A non-retryable error returns
/// immediately without consuming further attempts.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        debug!(attempt, max_attempts = config.max_attempts, "attempting call");
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !is_retryable(&error) {
                    warn!(?error, "non-retryable error, giving up");
                    return Err(error);
                }
                error!(attempt, ?error, "attempt failed");
                last_error = Some(error);

                if attempt < config.max_attempts {
                    let delay_ms = config.base_delay.as_millis() as f64
                        * config.backoff_multiplier.powi(attempt as i32 - 1);
                    let delay = Duration::from_millis(
                        delay_ms.min(config.max_delay.as_millis() as f64) as u64,
                    );
                    debug!(?delay, next_attempt = attempt + 1, "backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.expect("loop runs at least once, so an error was always recorded"))
}
