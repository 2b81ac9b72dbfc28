//! Audience classification.
//!
//! Each predicate is an independent audience axis evaluated against the whole
//! raw batch. The classifier joins all of them before anything reads the
//! result, and fails as a whole when any one of them fails.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::try_join3;
use tracing::{debug, warn};

use crate::{
    error::MessagesError,
    models::{
        classification::{ClassificationResult, PredicateKind},
        message::Message,
    },
};

/// An audience rule: given messages, return the ones the current user matches.
#[async_trait]
pub trait AudiencePredicate: Send + Sync {
    fn kind(&self) -> PredicateKind;

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>>;
}

/// Matches every message. Stands in for the group predicate when group
/// filtering is switched off.
pub struct AllMessages;

#[async_trait]
impl AudiencePredicate for AllMessages {
    fn kind(&self) -> PredicateKind {
        PredicateKind::Group
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        Ok(messages.to_vec())
    }
}

#[derive(Clone)]
pub struct Classifier {
    group: Arc<dyn AudiencePredicate>,
    data: Arc<dyn AudiencePredicate>,
    title: Arc<dyn AudiencePredicate>,
}

impl Classifier {
    pub fn new(
        group: Arc<dyn AudiencePredicate>,
        data: Arc<dyn AudiencePredicate>,
        title: Arc<dyn AudiencePredicate>,
    ) -> Self {
        Self { group, data, title }
    }

    pub async fn classify(&self, messages: &[Message]) -> Result<ClassificationResult, MessagesError> {
        let (by_group, by_data, by_title) = try_join3(
            run_predicate(self.group.as_ref(), PredicateKind::Group, messages),
            run_predicate(self.data.as_ref(), PredicateKind::Data, messages),
            run_predicate(self.title.as_ref(), PredicateKind::Title, messages),
        )
        .await?;

        debug!(
            raw = messages.len(),
            by_group = by_group.len(),
            by_data = by_data.len(),
            by_title = by_title.len(),
            "Classification complete"
        );

        Ok(ClassificationResult {
            raw: messages.to_vec(),
            by_group,
            by_data,
            by_title,
        })
    }
}

async fn run_predicate(
    predicate: &dyn AudiencePredicate,
    axis: PredicateKind,
    messages: &[Message],
) -> Result<Vec<Message>, MessagesError> {
    let matched = predicate.matching(messages).await.map_err(|e| {
        warn!(
            predicate = %axis,
            source = %predicate.kind(),
            error = %e,
            "Audience predicate failed"
        );
        MessagesError::classification(axis, e)
    })?;

    // A predicate may only narrow the batch it was given.
    let raw_ids: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    Ok(matched
        .into_iter()
        .filter(|m| raw_ids.contains(m.id.as_str()))
        .collect())
}
