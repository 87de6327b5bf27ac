use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Backoff used while a backing store comes up next to the service.
///
/// Delays double from `initial_delay` up to `max_delay`. With `jitter`
/// each delay is drawn from the upper half of its nominal value.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryConfig {
    /// Compose or k8s startup: 10 retries from 500ms, capped at 10s.
    pub fn startup() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }

    /// Nominal wait before retry `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay)
    }

    fn wait_before(&self, attempt: u32) -> Duration {
        let nominal = self.delay_for_attempt(attempt);
        if self.jitter {
            nominal.mul_f64(jitter_factor())
        } else {
            nominal
        }
    }
}

/// Run `operation` until it succeeds or the retries in `config` run out.
///
/// The last error is returned unchanged.
///
/// ```ignore
/// use database::common::{RetryConfig, retry_with_backoff};
///
/// let consumer = retry_with_backoff(
///     || StreamConsumer::connect(&url, worker_config.clone()),
///     RetryConfig::startup(),
/// )
/// .await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(retries = attempt, "Connected after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        attempt += 1;
        if attempt > config.max_retries {
            warn!(attempts = attempt, error = %error, "Giving up on connection");
            return Err(error);
        }

        let wait = config.wait_before(attempt);
        warn!(
            attempt,
            max_retries = config.max_retries,
            wait_ms = wait.as_millis() as u64,
            error = %error,
            "Connection attempt failed"
        );
        tokio::time::sleep(wait).await;
    }
}

/// Pseudo-random factor in [0.5, 1.0).
fn jitter_factor() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let sample = RandomState::new().hash_one(std::time::SystemTime::now()) % 500;
    0.5 + sample as f64 / 1000.0
}
