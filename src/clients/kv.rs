use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::Config, models::retry::RetryConfig, seen_state::KeyValueStore,
    utils::retry_with_backoff,
};

/// Seen ids stored as a JSON array of strings under a single Redis key.
pub struct RedisSeenStore {
    connection: MultiplexedConnection,
    key: String,
    retry_config: RetryConfig,
}

impl RedisSeenStore {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let redis_url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| anyhow!("REDIS_URL is not configured"))?;

        info!("Connecting to Redis");

        let client =
            Client::open(redis_url).map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!(key = %config.seen_ids_key, "Redis connection established");

        Ok(Self {
            connection,
            key: config.seen_ids_key.clone(),
            retry_config: config.retry_config(),
        })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.ping::<String>()
            .await
            .map_err(|e| anyhow!("Redis ping failed: {}", e))?;
        Ok(())
    }
}

/// Decodes a stored value; anything unreadable counts as nothing seen.
pub fn decode_seen_ids(value: Option<&str>) -> BTreeSet<String> {
    match value.map(str::trim) {
        None | Some("") => BTreeSet::new(),
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Unexpected value stored for seen message ids");
                BTreeSet::new()
            }),
    }
}

#[async_trait]
impl KeyValueStore for RedisSeenStore {
    async fn get_seen_ids(&self) -> Result<BTreeSet<String>> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(&self.key)
            .await
            .map_err(|e| anyhow!("Failed to get seen message ids: {}", e))?;

        Ok(decode_seen_ids(value.as_deref()))
    }

    async fn set_seen_ids(&self, ids: &BTreeSet<String>) -> Result<()> {
        let payload = serde_json::to_string(ids)?;

        retry_with_backoff(&self.retry_config, "set_seen_ids", || {
            let key = self.key.clone();
            let payload = payload.clone();
            let mut conn = self.connection.clone();

            async move {
                conn.set::<_, _, ()>(&key, payload)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(|e| anyhow!("set_seen_ids failed: {}", e))?;

        Ok(())
    }
}

/// Session-only seen ids, used when no Redis is configured.
#[derive(Default)]
pub struct InMemorySeenStore {
    ids: Mutex<BTreeSet<String>>,
    writes: AtomicU64,
}

impl InMemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
            writes: AtomicU64::new(0),
        }
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> BTreeSet<String> {
        self.ids.lock().await.clone()
    }
}

#[async_trait]
impl KeyValueStore for InMemorySeenStore {
    async fn get_seen_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.ids.lock().await.clone())
    }

    async fn set_seen_ids(&self, ids: &BTreeSet<String>) -> Result<()> {
        *self.ids.lock().await = ids.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
