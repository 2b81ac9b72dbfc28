use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::models::retry::RetryConfig;

/// Installs the JSON subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second initialisation (tests, embedding hosts) keeps the first subscriber.
    let _ = fmt().json().with_env_filter(filter).try_init();
}

/// Sleep before the attempt following `attempt`: the initial delay grown by the
/// multiplier per failed attempt, capped, then jittered by up to 10% either way.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let growth = config
        .backoff_multiplier
        .saturating_pow(attempt.saturating_sub(1));
    let base_ms = config
        .initial_delay_ms
        .saturating_mul(growth)
        .min(config.max_delay_ms);

    let jitter: f64 = rand::random_range(-0.1..=0.1);
    Duration::from_millis((base_ms as f64 * (1.0 + jitter)) as u64)
}

/// Runs `operation` until it succeeds or `max_attempts` is reached, returning
/// the last error. `label` names the operation in logs.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = label, attempt, "Operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(operation = label, attempts = attempt, error = %error, "Giving up on operation");
            return Err(error);
        }

        let delay = backoff_delay(config, attempt);
        debug!(
            operation = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, backing off"
        );

        sleep(delay).await;
        attempt += 1;
    }
}
