use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result},
};

use serde::{Deserialize, Serialize};

use crate::models::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    Group,
    Data,
    Title,
}

impl PredicateKind {
    /// Whether a message declares this audience axis.
    ///
    /// Group membership is the base filter and applies to every message; the
    /// data and title axes only narrow messages that carry the matching URL.
    pub fn applies_to(&self, message: &Message) -> bool {
        match self {
            PredicateKind::Group => true,
            PredicateKind::Data => message.data_url().is_some(),
            PredicateKind::Title => message.title_url().is_some(),
        }
    }
}

impl Display for PredicateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            PredicateKind::Group => write!(f, "group"),
            PredicateKind::Data => write!(f, "data"),
            PredicateKind::Title => write!(f, "title"),
        }
    }
}

/// Complete output of one classification: every predicate's matches against
/// the same raw batch. Only built once all predicates have answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub raw: Vec<Message>,
    pub by_group: Vec<Message>,
    pub by_data: Vec<Message>,
    pub by_title: Vec<Message>,
}

impl ClassificationResult {
    pub fn partition(&self, kind: PredicateKind) -> &[Message] {
        match kind {
            PredicateKind::Group => &self.by_group,
            PredicateKind::Data => &self.by_data,
            PredicateKind::Title => &self.by_title,
        }
    }

    /// Messages of the raw batch present in every partition that applies to
    /// them, in raw batch order.
    pub fn eligible(&self) -> Vec<Message> {
        let group_ids = ids_of(&self.by_group);
        let data_ids = ids_of(&self.by_data);
        let title_ids = ids_of(&self.by_title);

        self.raw
            .iter()
            .filter(|message| {
                [
                    (PredicateKind::Group, &group_ids),
                    (PredicateKind::Data, &data_ids),
                    (PredicateKind::Title, &title_ids),
                ]
                .iter()
                .all(|(kind, ids)| !kind.applies_to(message) || ids.contains(message.id.as_str()))
            })
            .cloned()
            .collect()
    }
}

fn ids_of(messages: &[Message]) -> HashSet<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}
