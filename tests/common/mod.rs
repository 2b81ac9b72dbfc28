#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use messages_service::{
    classifier::{AudiencePredicate, Classifier},
    clients::kv::InMemorySeenStore,
    models::{
        classification::PredicateKind,
        message::{Category, Message},
    },
    pipeline::{MessageSource, ResolutionPipeline},
    seen_state::KeyValueStore,
};
use tokio::sync::Notify;

pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .expect("valid test date")
}

pub fn announcement(id: &str) -> Message {
    Message::new(id, Category::Announcement, date(2024, 1, 1)).with_groups(["everyone"])
}

pub fn notification(id: &str) -> Message {
    Message::new(id, Category::Notification, date(2024, 1, 1)).with_groups(["everyone"])
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

/// Answers with the input messages whose ids are in `matches`.
pub struct FixedPredicate {
    kind: PredicateKind,
    matches: HashSet<String>,
    pub calls: AtomicU32,
}

impl FixedPredicate {
    pub fn new(kind: PredicateKind, matches: &[&str]) -> Self {
        Self {
            kind,
            matches: matches.iter().map(|s| s.to_string()).collect(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AudiencePredicate for FixedPredicate {
    fn kind(&self) -> PredicateKind {
        self.kind
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(messages
            .iter()
            .filter(|m| self.matches.contains(&m.id))
            .cloned()
            .collect())
    }
}

/// Fails while `failing` is set, otherwise matches everything.
pub struct FlakyPredicate {
    kind: PredicateKind,
    pub failing: AtomicBool,
}

impl FlakyPredicate {
    pub fn failing(kind: PredicateKind) -> Self {
        Self {
            kind,
            failing: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl AudiencePredicate for FlakyPredicate {
    fn kind(&self) -> PredicateKind {
        self.kind
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("audience service unreachable"));
        }
        Ok(messages.to_vec())
    }
}

/// Matches everything, but only once `release` is notified.
pub struct GatedPredicate {
    kind: PredicateKind,
    pub release: Notify,
}

impl GatedPredicate {
    pub fn new(kind: PredicateKind) -> Self {
        Self {
            kind,
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl AudiencePredicate for GatedPredicate {
    fn kind(&self) -> PredicateKind {
        self.kind
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        self.release.notified().await;
        Ok(messages.to_vec())
    }
}

/// Source serving a mutable batch and counting fetches.
pub struct FakeSource {
    pub messages: std::sync::Mutex<Vec<Message>>,
    pub failing: AtomicBool,
    pub fetches: AtomicU32,
}

impl FakeSource {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: std::sync::Mutex::new(messages),
            failing: AtomicBool::new(false),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn replace(&self, messages: Vec<Message>) {
        *self.messages.lock().unwrap() = messages;
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn fetch_messages(&self) -> Result<Vec<Message>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.messages.lock().unwrap().clone())
    }
}

/// Key-value store whose writes fail while `failing` is set.
#[derive(Default)]
pub struct FlakyKv {
    pub inner: InMemorySeenStore,
    pub failing: AtomicBool,
    pub failing_reads: AtomicBool,
    pub attempted_writes: AtomicU32,
}

impl FlakyKv {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            inner: InMemorySeenStore::with_ids(ids.iter().copied()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyKv {
    async fn get_seen_ids(&self) -> Result<BTreeSet<String>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("kv read timed out"));
        }
        self.inner.get_seen_ids().await
    }

    async fn set_seen_ids(&self, ids: &BTreeSet<String>) -> Result<()> {
        self.attempted_writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("kv write rejected"));
        }
        self.inner.set_seen_ids(ids).await
    }
}

/// Every predicate matches every message.
pub fn permissive_classifier() -> Classifier {
    Classifier::new(
        Arc::new(FixedPredicateAll(PredicateKind::Group)),
        Arc::new(FixedPredicateAll(PredicateKind::Data)),
        Arc::new(FixedPredicateAll(PredicateKind::Title)),
    )
}

pub struct FixedPredicateAll(pub PredicateKind);

#[async_trait]
impl AudiencePredicate for FixedPredicateAll {
    fn kind(&self) -> PredicateKind {
        self.0
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        Ok(messages.to_vec())
    }
}

pub fn pipeline_with(
    source: Arc<dyn MessageSource>,
    classifier: Classifier,
    kv: Arc<dyn KeyValueStore>,
) -> Arc<ResolutionPipeline> {
    Arc::new(ResolutionPipeline::new(source, classifier, kv, 32))
}
