use std::{collections::HashSet, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    classifier::AudiencePredicate,
    config::Config,
    models::{classification::PredicateKind, message::Message, retry::RetryConfig},
    pipeline::MessageSource,
    utils::retry_with_backoff,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Wrapped { messages: Vec<Message> },
    Bare(Vec<Message>),
}

#[derive(Deserialize)]
struct GroupsDocument {
    #[serde(default)]
    groups: Vec<Group>,
}

#[derive(Deserialize)]
struct Group {
    name: String,
}

fn build_http_client(config: &Config) -> Result<Client, Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))
}

pub struct HttpMessageFeed {
    http_client: Client,
    url: String,
    retry_config: RetryConfig,
}

impl HttpMessageFeed {
    pub fn new(config: &Config, url: &str) -> Result<Self, Error> {
        info!(url, "Message feed client initialized");

        Ok(Self {
            http_client: build_http_client(config)?,
            url: url.to_string(),
            retry_config: config.retry_config(),
        })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        let response = self.http_client.get(&self.url).send().await?;
        if response.status().is_server_error() {
            return Err(anyhow!("Message feed returned status {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for HttpMessageFeed {
    async fn fetch_messages(&self) -> Result<Vec<Message>> {
        debug!(url = %self.url, "Fetching messages from feed");

        let document = retry_with_backoff(&self.retry_config, "fetch_messages", || {
            let client = self.http_client.clone();
            let url = self.url.clone();

            async move {
                let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
                let status = response.status();

                if !status.is_success() {
                    return Err(format!("Message feed returned status {}", status));
                }

                response
                    .json::<FeedDocument>()
                    .await
                    .map_err(|e| format!("Failed to parse message feed JSON: {}", e))
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to fetch messages: {}", e))?;

        let messages = match document {
            FeedDocument::Wrapped { messages } => messages,
            FeedDocument::Bare(messages) => messages,
        };

        debug!(count = messages.len(), "Messages fetched");
        Ok(messages)
    }
}

/// Matches a message when any of its groups is one the user belongs to.
pub struct HttpGroupPredicate {
    http_client: Client,
    url: String,
}

impl HttpGroupPredicate {
    pub fn new(config: &Config, url: &str) -> Result<Self, Error> {
        Ok(Self {
            http_client: build_http_client(config)?,
            url: url.to_string(),
        })
    }

    async fn user_groups(&self) -> Result<HashSet<String>, Error> {
        let response = self.http_client.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(anyhow!("Group service returned status {}", status));
        }

        let document: GroupsDocument = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse groups JSON: {}", e))?;

        Ok(document.groups.into_iter().map(|g| g.name).collect())
    }
}

#[async_trait]
impl AudiencePredicate for HttpGroupPredicate {
    fn kind(&self) -> PredicateKind {
        PredicateKind::Group
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        let groups = self.user_groups().await?;
        debug!(groups = groups.len(), "User groups fetched");

        Ok(messages
            .iter()
            .filter(|m| m.groups.iter().any(|g| groups.contains(g)))
            .cloned()
            .collect())
    }
}

/// Outcome of fetching one per-message audience URL. `None` means the service
/// answered but the user is not in the audience.
async fn probe(client: &Client, url: &str) -> Result<Option<Value>, Error> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("Audience request to {} failed: {}", url, e))?;
    let status = response.status();

    if status.is_server_error() {
        return Err(anyhow!("Audience service {} returned status {}", url, status));
    }

    if !status.is_success() {
        debug!(url, %status, "Audience service declined");
        return Ok(None);
    }

    match response.json::<Value>().await {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(url, error = %e, "Audience service returned unreadable body");
            Ok(None)
        }
    }
}

fn has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn has_title(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Object(fields) => fields
            .get("title")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty()),
        _ => false,
    }
}

async fn matching_by_url<U, P>(
    client: &Client,
    messages: &[Message],
    url_of: U,
    passes: P,
) -> Result<Vec<Message>>
where
    U: Fn(&Message) -> Option<&str>,
    P: Fn(&Value) -> bool,
{
    let candidates: Vec<(&Message, &str)> = messages
        .iter()
        .filter_map(|m| url_of(m).map(|url| (m, url)))
        .collect();

    let answers = try_join_all(candidates.iter().map(|(_, url)| probe(client, url))).await?;

    Ok(candidates
        .into_iter()
        .zip(answers)
        .filter(|(_, answer)| answer.as_ref().is_some_and(&passes))
        .map(|((message, _), _)| message.clone())
        .collect())
}

/// Matches messages whose `audienceFilter.dataUrl` returns non-empty data.
pub struct HttpDataPredicate {
    http_client: Client,
}

impl HttpDataPredicate {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            http_client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl AudiencePredicate for HttpDataPredicate {
    fn kind(&self) -> PredicateKind {
        PredicateKind::Data
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        matching_by_url(&self.http_client, messages, Message::data_url, has_data).await
    }
}

/// Matches messages whose `titleUrl` resolves to a non-empty title.
pub struct HttpTitlePredicate {
    http_client: Client,
}

impl HttpTitlePredicate {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            http_client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl AudiencePredicate for HttpTitlePredicate {
    fn kind(&self) -> PredicateKind {
        PredicateKind::Title
    }

    async fn matching(&self, messages: &[Message]) -> Result<Vec<Message>> {
        matching_by_url(&self.http_client, messages, Message::title_url, has_title).await
    }
}
