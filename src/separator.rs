//! Pure partitioning of an eligible set. Every input message lands in exactly
//! one bucket per axis and input order is kept inside each bucket.

use std::cmp::Reverse;

use crate::models::{
    message::{Category, Message},
    seen::SeenRecord,
    view::{CategorySet, SeparatedSet},
};

pub fn separate_seen(eligible: &[Message], seen: &SeenRecord) -> SeparatedSet {
    let (seen_messages, unseen): (Vec<Message>, Vec<Message>) = eligible
        .iter()
        .cloned()
        .partition(|message| seen.contains(&message.id));

    SeparatedSet {
        seen: seen_messages,
        unseen,
    }
}

pub fn separate_categories(eligible: &[Message]) -> CategorySet {
    let (announcements, notifications): (Vec<Message>, Vec<Message>) = eligible
        .iter()
        .cloned()
        .partition(|message| message.category == Category::Announcement);

    CategorySet {
        announcements,
        notifications,
    }
}

/// The entries a menu renders: high priority first, feed order otherwise,
/// truncated to `limit`.
pub fn menu_slice(messages: &[Message], limit: usize) -> Vec<Message> {
    let mut ordered = messages.to_vec();
    ordered.sort_by_key(|message| Reverse(message.priority));
    ordered.truncate(limit);
    ordered
}
