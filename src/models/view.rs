use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    models::{
        message::{Category, Message},
        seen::SeenRecord,
    },
    separator::{separate_categories, separate_seen},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeparatedSet {
    pub seen: Vec<Message>,
    pub unseen: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySet {
    pub announcements: Vec<Message>,
    pub notifications: Vec<Message>,
}

impl CategorySet {
    pub fn of(&self, category: Category) -> &[Message] {
        match category {
            Category::Announcement => &self.announcements,
            Category::Notification => &self.notifications,
        }
    }
}

/// What presentation consumers render after a resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedView {
    pub cycle: u64,
    pub resolved_at: DateTime<Utc>,
    pub eligible: Vec<Message>,
    pub separated: SeparatedSet,
    pub unseen_by_category: CategorySet,
    pub seen_by_category: CategorySet,
    pub seen: SeenRecord,
}

impl ResolvedView {
    pub fn build(cycle: u64, eligible: Vec<Message>, seen: SeenRecord) -> Self {
        let separated = separate_seen(&eligible, &seen);
        let unseen_by_category = separate_categories(&separated.unseen);
        let seen_by_category = separate_categories(&separated.seen);

        Self {
            cycle,
            resolved_at: Utc::now(),
            eligible,
            separated,
            unseen_by_category,
            seen_by_category,
            seen,
        }
    }

    /// Re-derives the seen/unseen split against a newer seen record. Eligibility
    /// is untouched: dismissing never changes who may see a message.
    pub fn reseparate(&self, seen: SeenRecord) -> Self {
        let mut view = Self::build(self.cycle, self.eligible.clone(), seen);
        view.resolved_at = self.resolved_at;
        view
    }

    pub fn unseen_high_priority(&self, category: Category) -> Vec<Message> {
        self.unseen_by_category
            .of(category)
            .iter()
            .filter(|m| m.is_high_priority())
            .cloned()
            .collect()
    }

    pub fn has_priority_notifications(&self) -> bool {
        self.unseen_by_category
            .notifications
            .iter()
            .any(Message::is_high_priority)
    }

    pub fn has_unseen_announcements(&self) -> bool {
        !self.unseen_by_category.announcements.is_empty()
    }
}
