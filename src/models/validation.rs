use std::collections::HashSet;

use anyhow::{Result, anyhow};
use tracing::warn;

use crate::models::message::Message;

pub fn validate_message_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(anyhow!("Message id cannot be empty"));
    }

    if id.len() > 200 {
        return Err(anyhow!("Message id too long (maximum 200 characters)"));
    }

    if id.chars().any(char::is_control) {
        return Err(anyhow!("Message id contains control characters"));
    }

    Ok(())
}

/// Drops messages with invalid ids and later duplicates of an id, keeping the
/// first occurrence, so ids are unique within the batch.
pub fn dedupe_batch(messages: Vec<Message>) -> Vec<Message> {
    let mut seen_ids = HashSet::with_capacity(messages.len());

    messages
        .into_iter()
        .filter(|message| {
            if let Err(e) = validate_message_id(&message.id) {
                warn!(message_id = %message.id, error = %e, "Dropping message with invalid id");
                return false;
            }

            if !seen_ids.insert(message.id.clone()) {
                warn!(message_id = %message.id, "Dropping duplicate message id in batch");
                return false;
            }

            true
        })
        .collect()
}
