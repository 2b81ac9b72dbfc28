use std::collections::BTreeSet;

use anyhow::Result;
use messages_service::{
    clients::kv::{InMemorySeenStore, RedisSeenStore, decode_seen_ids},
    config::Config,
    seen_state::KeyValueStore,
};
use uuid::Uuid;

/// Test: Stored JSON arrays decode into the seen set
#[tokio::test]
async fn test_decode_stored_json_array() -> Result<()> {
    let ids = decode_seen_ids(Some(r#"["3","1","3"]"#));

    assert_eq!(ids, BTreeSet::from(["1".to_string(), "3".to_string()]));

    Ok(())
}

/// Test: Absent, empty or malformed values mean nothing has been seen
#[tokio::test]
async fn test_decode_unusable_values_as_empty() -> Result<()> {
    assert!(decode_seen_ids(None).is_empty());
    assert!(decode_seen_ids(Some("")).is_empty());
    assert!(decode_seen_ids(Some("   ")).is_empty());
    assert!(decode_seen_ids(Some("not json")).is_empty());
    assert!(decode_seen_ids(Some(r#"{"ids":["1"]}"#)).is_empty());

    Ok(())
}

/// Test: The in-memory store returns the last value written
#[tokio::test]
async fn test_in_memory_store_round_trip() -> Result<()> {
    let store = InMemorySeenStore::with_ids(["a"]);
    assert_eq!(store.get_seen_ids().await?.len(), 1);

    let next = BTreeSet::from(["b".to_string(), "c".to_string()]);
    store.set_seen_ids(&next).await?;

    assert_eq!(store.get_seen_ids().await?, next);
    assert_eq!(store.write_count(), 1);

    Ok(())
}

/// Test: Seen ids survive a reconnect to Redis
#[tokio::test]
#[ignore = "requires REDIS_URL pointing at a running Redis"]
async fn test_redis_store_persists_seen_ids() -> Result<()> {
    let mut config = Config::load()?;
    config.seen_ids_key = format!("messages:seen:test:{}", Uuid::new_v4());

    let store = RedisSeenStore::connect(&config).await?;
    store.health_check().await?;
    assert!(store.get_seen_ids().await?.is_empty());

    let ids = BTreeSet::from(["10".to_string(), "11".to_string()]);
    store.set_seen_ids(&ids).await?;

    let reconnected = RedisSeenStore::connect(&config).await?;
    assert_eq!(reconnected.get_seen_ids().await?, ids);

    Ok(())
}
