use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Result, anyhow};
use messages_service::{config::Config, models::retry::RetryConfig, utils::retry_with_backoff};
use tokio::time::Instant;

fn fast_config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 20,
        max_delay_ms: 60,
        backoff_multiplier: 2,
    }
}

/// Test: A feed read that succeeds first time is not repeated
#[tokio::test]
async fn test_first_success_is_not_retried() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let body = retry_with_backoff(&fast_config(3), "fetch_messages", || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("[]")
        }
    })
    .await
    .map_err(|e| anyhow!(e))?;

    assert_eq!(body, "[]");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    Ok(())
}

/// Test: A seen-ids write that fails transiently lands on a later attempt
#[tokio::test]
async fn test_transient_write_failure_recovers() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    retry_with_backoff(&fast_config(4), "set_seen_ids", || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("connection reset".to_string())
            } else {
                Ok(())
            }
        }
    })
    .await
    .map_err(|e| anyhow!(e))?;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    Ok(())
}

/// Test: The last error is returned once attempts run out
#[tokio::test]
async fn test_exhausted_attempts_return_last_error() -> Result<()> {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&fast_config(3), "fetch_messages", || {
        let counter = Arc::clone(&counter);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(format!("feed returned status 503 (attempt {})", attempt))
        }
    })
    .await;

    assert_eq!(
        result.expect_err("should give up"),
        "feed returned status 503 (attempt 3)"
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    Ok(())
}

/// Test: Delays grow but never pass the configured cap
#[tokio::test]
async fn test_backoff_is_capped() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 5,
        initial_delay_ms: 40,
        max_delay_ms: 80,
        backoff_multiplier: 4,
    };

    let start = Instant::now();
    let times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let recorder = Arc::clone(&times);

    let _ = retry_with_backoff(&config, "fetch_messages", || {
        let recorder = Arc::clone(&recorder);
        async move {
            recorder.lock().await.push(start.elapsed().as_millis());
            Err::<(), _>("unavailable")
        }
    })
    .await;

    let times = times.lock().await;
    assert_eq!(times.len(), 5);

    for pair in times.windows(2).skip(1) {
        let delay = pair[1] - pair[0];
        assert!(
            delay <= (config.max_delay_ms * 12 / 10) as u128 + 20,
            "delay {}ms exceeded the cap",
            delay
        );
    }

    Ok(())
}

/// Test: Retry settings come from the service configuration
#[tokio::test]
async fn test_retry_config_from_service_config() -> Result<()> {
    let config = Config {
        max_retry_attempts: 7,
        initial_retry_delay_ms: 15,
        max_retry_delay_ms: 900,
        retry_backoff_multiplier: 3,
        ..Config::default()
    };

    let retry = config.retry_config();

    assert_eq!(retry.max_attempts, 7);
    assert_eq!(retry.initial_delay_ms, 15);
    assert_eq!(retry.max_delay_ms, 900);
    assert_eq!(retry.backoff_multiplier, 3);

    let defaults = RetryConfig::default();
    assert_eq!(defaults.max_attempts, Config::default().max_retry_attempts);

    Ok(())
}
