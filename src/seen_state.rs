use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    error::MessagesError,
    models::{seen::SeenRecord, status::SeenAction},
};

/// Persistence capability for seen ids. Reads return the last value written by
/// this client.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_seen_ids(&self) -> Result<BTreeSet<String>>;

    async fn set_seen_ids(&self, ids: &BTreeSet<String>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenUpdate {
    /// The id set already had the requested shape; nothing was written.
    Unchanged,
    Persisted,
    /// The in-memory record changed but the write failed. It is retried on the
    /// next mutation or [`SeenStateStore::flush`].
    PersistFailed(MessagesError),
}

impl SeenUpdate {
    pub fn is_changed(&self) -> bool {
        !matches!(self, SeenUpdate::Unchanged)
    }
}

/// Session copy of the seen record with write-through persistence.
pub struct SeenStateStore {
    kv: Arc<dyn KeyValueStore>,
    record: SeenRecord,
    loaded: bool,
    /// Restores issued before the first successful read; the stored ids they
    /// name are dropped when that read is merged.
    removed_before_load: BTreeSet<String>,
    pending_write: bool,
    writes: u64,
}

impl SeenStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            record: SeenRecord::new(),
            loaded: false,
            removed_before_load: BTreeSet::new(),
            pending_write: false,
            writes: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of writes issued to the key-value store this session.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn snapshot(&self) -> SeenRecord {
        self.record.clone()
    }

    /// Reads the persisted ids the first time it is called. A failed read
    /// leaves the record empty and is attempted again on the next call.
    pub async fn load(&mut self) -> SeenRecord {
        if self.loaded {
            return self.record.clone();
        }

        match self.kv.get_seen_ids().await {
            Ok(ids) => {
                // Ids mutated before the first successful read are kept.
                let mut merged: BTreeSet<String> = self.record.ids().clone();
                merged.extend(ids);
                for id in std::mem::take(&mut self.removed_before_load) {
                    merged.remove(&id);
                }
                self.record = merged.into_iter().collect();
                self.loaded = true;
                info!(seen = self.record.len(), "Seen message ids loaded");
            }
            Err(e) => {
                warn!(error = %e, "Failed to load seen message ids");
            }
        }

        self.record.clone()
    }

    pub async fn dismiss(&mut self, id: &str) -> SeenUpdate {
        self.load().await;
        self.removed_before_load.remove(id);

        if !self.record.insert(id) {
            debug!(message_id = id, "Message already seen, skipping dismiss");
            return SeenUpdate::Unchanged;
        }

        self.persist(SeenAction::Dismiss).await
    }

    pub async fn restore(&mut self, id: &str) -> SeenUpdate {
        self.load().await;

        let removed = self.record.remove(id);
        if !self.loaded {
            // The unread stored set may still hold the id.
            self.removed_before_load.insert(id.to_string());
        } else if !removed {
            debug!(message_id = id, "Message not seen, skipping restore");
            return SeenUpdate::Unchanged;
        }

        self.persist(SeenAction::Restore).await
    }

    pub async fn mark_all_seen<'a, I>(&mut self, ids: I) -> SeenUpdate
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.load().await;

        let inserted = ids
            .into_iter()
            .filter(|id| {
                self.removed_before_load.remove(*id);
                self.record.insert(id)
            })
            .count();

        if inserted == 0 {
            return SeenUpdate::Unchanged;
        }

        debug!(inserted, "Marking messages seen");
        self.persist(SeenAction::MarkAll).await
    }

    /// Retries a write that failed earlier. `Ok(false)` when nothing was pending.
    pub async fn flush(&mut self) -> Result<bool, MessagesError> {
        if !self.pending_write {
            return Ok(false);
        }

        self.load().await;

        match self.persist(SeenAction::MarkAll).await {
            SeenUpdate::PersistFailed(e) => Err(e),
            _ => Ok(true),
        }
    }

    async fn persist(&mut self, action: SeenAction) -> SeenUpdate {
        if !self.loaded {
            // Writing now would replace ids we have never read.
            self.pending_write = true;
            let error = MessagesError::persistence("seen ids were never loaded");
            warn!(action = %action, error = %error, "Deferring seen-state write");
            return SeenUpdate::PersistFailed(error);
        }

        self.writes += 1;

        match self.kv.set_seen_ids(self.record.ids()).await {
            Ok(()) => {
                self.pending_write = false;
                debug!(action = %action, seen = self.record.len(), "Seen message ids persisted");
                SeenUpdate::Persisted
            }
            Err(e) => {
                self.pending_write = true;
                warn!(action = %action, error = %e, "Failed to persist seen message ids");
                SeenUpdate::PersistFailed(MessagesError::persistence(e))
            }
        }
    }
}
