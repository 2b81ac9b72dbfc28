use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{error::MessagesError, models::retry::RetryConfig};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub messages_url: Option<String>,
    #[serde(default)]
    pub group_url: Option<String>,
    #[serde(default)]
    pub guest_mode: bool,
    #[serde(default)]
    pub disable_group_filtering: bool,

    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_seen_ids_key")]
    pub seen_ids_key: String,

    #[serde(default)]
    pub rabbitmq_url: Option<String>,
    #[serde(default = "default_refresh_queue_name")]
    pub refresh_queue_name: String,

    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_render_limit")]
    pub render_limit: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    /// The messages URL when messaging is usable for this session.
    pub fn messages_endpoint(&self) -> Result<&str, MessagesError> {
        if self.guest_mode {
            return Err(MessagesError::FeatureDisabled(
                "guest mode -- hiding messages features".to_string(),
            ));
        }

        match self.messages_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(MessagesError::FeatureDisabled(
                "MESSAGES_URL is not configured -- hiding messages features".to_string(),
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            messages_url: None,
            group_url: None,
            guest_mode: false,
            disable_group_filtering: false,
            redis_url: None,
            seen_ids_key: default_seen_ids_key(),
            rabbitmq_url: None,
            refresh_queue_name: default_refresh_queue_name(),
            http_timeout_seconds: default_http_timeout_seconds(),
            max_retry_attempts: default_max_retry_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            render_limit: default_render_limit(),
            event_capacity: default_event_capacity(),
            server_port: default_server_port(),
        }
    }
}

fn default_seen_ids_key() -> String {
    "messages:seen".to_string()
}

fn default_refresh_queue_name() -> String {
    "messages.refresh".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    2000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_render_limit() -> usize {
    3
}

fn default_event_capacity() -> usize {
    64
}

fn default_server_port() -> u16 {
    8080
}
