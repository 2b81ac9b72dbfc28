//! Resolution cycles: fetch, classify, separate, publish.
//!
//! The pipeline owns the only mutable seen record. Lock order is always
//! `seen` before `published`, so a view is never published against a seen
//! record older than the one a concurrent dismissal just persisted.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    classifier::Classifier,
    error::MessagesError,
    models::{
        events::ResolutionEvent,
        message::Message,
        seen::SeenRecord,
        status::ResolutionStatus,
        validation::dedupe_batch,
        view::ResolvedView,
    },
    seen_state::{KeyValueStore, SeenStateStore, SeenUpdate},
};

#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_messages(&self) -> Result<Vec<Message>>;
}

/// A fixed batch, for hosts that already hold the messages.
pub struct StaticMessages(pub Vec<Message>);

#[async_trait]
impl MessageSource for StaticMessages {
    async fn fetch_messages(&self) -> Result<Vec<Message>> {
        Ok(self.0.clone())
    }
}

struct Published {
    cycle: u64,
    view: Option<Arc<ResolvedView>>,
    status: ResolutionStatus,
}

pub struct ResolutionPipeline {
    source: Arc<dyn MessageSource>,
    classifier: Classifier,
    seen: Mutex<SeenStateStore>,
    raw_cache: Mutex<Option<Vec<Message>>>,
    published: RwLock<Published>,
    events: broadcast::Sender<ResolutionEvent>,
    next_cycle: AtomicU64,
    disabled: Option<MessagesError>,
}

impl ResolutionPipeline {
    pub fn new(
        source: Arc<dyn MessageSource>,
        classifier: Classifier,
        kv: Arc<dyn KeyValueStore>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));

        Self {
            source,
            classifier,
            seen: Mutex::new(SeenStateStore::new(kv)),
            raw_cache: Mutex::new(None),
            published: RwLock::new(Published {
                cycle: 0,
                view: None,
                status: ResolutionStatus::Idle,
            }),
            events,
            next_cycle: AtomicU64::new(1),
            disabled: None,
        }
    }

    /// Every cycle fails with `reason` without touching the feed.
    pub fn with_feature_disabled(mut self, reason: MessagesError) -> Self {
        self.disabled = Some(reason);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolutionEvent> {
        self.events.subscribe()
    }

    pub async fn current_view(&self) -> Option<Arc<ResolvedView>> {
        self.published.read().await.view.clone()
    }

    pub async fn status(&self) -> ResolutionStatus {
        self.published.read().await.status
    }

    pub async fn seen_snapshot(&self) -> SeenRecord {
        self.seen.lock().await.load().await
    }

    pub async fn seen_write_count(&self) -> u64 {
        self.seen.lock().await.write_count()
    }

    /// Drops the cached feed and runs a fresh cycle.
    pub async fn request_refresh(&self) -> Result<Arc<ResolvedView>, MessagesError> {
        self.raw_cache.lock().await.take();
        debug!("Raw message cache invalidated");
        self.refresh().await
    }

    /// Runs a cycle over the cached feed, fetching it first when the cache is empty.
    pub async fn refresh(&self) -> Result<Arc<ResolvedView>, MessagesError> {
        let cycle = self.begin_cycle().await;

        if let Some(reason) = &self.disabled {
            return Err(self.fail(cycle, reason.clone()).await);
        }

        let raw = match self.raw_messages().await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(cycle, e).await),
        };

        self.run_cycle(cycle, raw).await
    }

    /// Runs a cycle over an already fetched batch.
    pub async fn resolve(&self, raw: Vec<Message>) -> Result<Arc<ResolvedView>, MessagesError> {
        let cycle = self.begin_cycle().await;

        if let Some(reason) = &self.disabled {
            return Err(self.fail(cycle, reason.clone()).await);
        }

        self.run_cycle(cycle, raw).await
    }

    pub async fn dismiss(&self, id: &str) -> SeenUpdate {
        let mut seen = self.seen.lock().await;
        let update = seen.dismiss(id).await;
        self.after_seen_update(&seen, &update).await;
        update
    }

    pub async fn restore(&self, id: &str) -> SeenUpdate {
        let mut seen = self.seen.lock().await;
        let update = seen.restore(id).await;
        self.after_seen_update(&seen, &update).await;
        update
    }

    pub async fn mark_all_seen(&self, ids: &[String]) -> SeenUpdate {
        let mut seen = self.seen.lock().await;
        let update = seen.mark_all_seen(ids.iter().map(String::as_str)).await;
        self.after_seen_update(&seen, &update).await;
        update
    }

    /// Retries a seen-state write that failed earlier.
    pub async fn flush_seen(&self) -> Result<bool, MessagesError> {
        self.seen.lock().await.flush().await
    }

    async fn begin_cycle(&self) -> u64 {
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst);

        {
            let mut published = self.published.write().await;
            if published.cycle < cycle {
                published.status = ResolutionStatus::Resolving;
            }
        }

        self.emit(ResolutionEvent::Started { cycle });
        cycle
    }

    async fn raw_messages(&self) -> Result<Vec<Message>, MessagesError> {
        let mut cache = self.raw_cache.lock().await;

        if let Some(raw) = cache.as_ref() {
            return Ok(raw.clone());
        }

        let fetched = self.source.fetch_messages().await.map_err(|e| {
            warn!(error = %e, "Problem getting all messages");
            MessagesError::transport(e)
        })?;

        let raw = dedupe_batch(fetched);
        *cache = Some(raw.clone());
        Ok(raw)
    }

    async fn run_cycle(
        &self,
        cycle: u64,
        raw: Vec<Message>,
    ) -> Result<Arc<ResolvedView>, MessagesError> {
        let trace_id = Uuid::new_v4();
        let raw = dedupe_batch(raw);

        debug!(cycle, trace_id = %trace_id, raw = raw.len(), "Resolving messages");

        let classification = match self.classifier.classify(&raw).await {
            Ok(classification) => classification,
            Err(e) => return Err(self.fail(cycle, e).await),
        };
        let eligible = classification.eligible();

        let mut seen = self.seen.lock().await;
        let snapshot = seen.load().await;
        let view = Arc::new(ResolvedView::build(cycle, eligible, snapshot));

        let mut published = self.published.write().await;
        if published.cycle > cycle {
            debug!(
                cycle,
                newer_cycle = published.cycle,
                "Resolution superseded by a newer cycle, discarding result"
            );
            return match published.view.clone() {
                Some(current) => Ok(current),
                None => Ok(view),
            };
        }

        published.cycle = cycle;
        published.view = Some(Arc::clone(&view));
        published.status = ResolutionStatus::Resolved;

        info!(
            cycle,
            trace_id = %trace_id,
            eligible = view.eligible.len(),
            unseen = view.separated.unseen.len(),
            "Messages resolved"
        );

        // Sent under the write guard so completions go out in cycle order.
        self.emit(ResolutionEvent::Completed(Arc::clone(&view)));
        drop(published);
        drop(seen);
        Ok(view)
    }

    /// Records a failed cycle. Classification failures keep the previous view
    /// on display; feed and configuration failures hide the feature.
    async fn fail(&self, cycle: u64, reason: MessagesError) -> MessagesError {
        {
            let mut published = self.published.write().await;
            if published.cycle <= cycle {
                published.cycle = cycle;
                if reason.hides_feature() {
                    published.view = None;
                    published.status = ResolutionStatus::Hidden;
                } else {
                    published.status = ResolutionStatus::Failed;
                }

                self.emit(ResolutionEvent::Failed {
                    cycle,
                    reason: reason.clone(),
                });
            }
        }

        warn!(cycle, error = %reason, "Message resolution failed");

        reason
    }

    async fn after_seen_update(&self, seen: &SeenStateStore, update: &SeenUpdate) {
        if !update.is_changed() {
            return;
        }

        let snapshot = seen.snapshot();

        {
            let mut published = self.published.write().await;
            if let Some(view) = published.view.as_ref() {
                let refreshed = view.reseparate(snapshot.clone());
                published.view = Some(Arc::new(refreshed));
            }
        }

        self.emit(ResolutionEvent::StateChanged(snapshot));
    }

    fn emit(&self, event: ResolutionEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!(event = name, "No subscribers for resolution event");
        }
    }
}
