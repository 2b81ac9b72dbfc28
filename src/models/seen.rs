use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Ids of the messages the current user has acknowledged.
///
/// Mutations are single-id inserts and removals so two dismissals never
/// overwrite each other; only [`crate::seen_state::SeenStateStore`] holds a
/// mutable instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenRecord {
    ids: BTreeSet<String>,
}

impl SeenRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Returns `true` when the id was not present before.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    /// Returns `true` when the id was present before.
    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }
}

impl FromIterator<String> for SeenRecord {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for SeenRecord {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl From<SeenRecord> for BTreeSet<String> {
    fn from(record: SeenRecord) -> Self {
        record.ids
    }
}
