use std::{cmp::Ordering, collections::BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Announcement,
    Notification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

/// A notice as delivered by the message feed. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub groups: BTreeSet<String>,

    #[serde(default)]
    pub audience_filter: AudienceFilter,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_url: Option<String>,

    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: Priority,

    #[serde(deserialize_with = "deserialize_go_live_date")]
    pub go_live_date: DateTime<Utc>,

    #[serde(rename = "messageType", alias = "category")]
    pub category: Category,
}

impl Message {
    pub fn new(id: impl Into<String>, category: Category, go_live_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: None,
            groups: BTreeSet::new(),
            audience_filter: AudienceFilter::default(),
            title_url: None,
            priority: Priority::Normal,
            go_live_date,
            category,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.audience_filter.data_url = Some(url.into());
        self
    }

    pub fn with_title_url(mut self, url: impl Into<String>) -> Self {
        self.title_url = Some(url.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn data_url(&self) -> Option<&str> {
        self.audience_filter
            .data_url
            .as_deref()
            .filter(|url| !url.is_empty())
    }

    pub fn title_url(&self) -> Option<&str> {
        self.title_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority == Priority::High
    }
}

/// Orders ids numerically when both are unsigned integers, lexically otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    // Feeds send `null` or omit the field for ordinary messages.
    Ok(Option::<Priority>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_go_live_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_go_live_date(&raw).map_err(serde::de::Error::custom)
}

/// Accepts RFC 3339 timestamps, zone-less date-times (taken as UTC) and plain dates.
pub fn parse_go_live_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    Err(format!("Unrecognised goLiveDate '{}'", raw))
}
