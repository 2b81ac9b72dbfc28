use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use lapin::{Connection, ConnectionProperties};
use tracing::{debug, warn};

use crate::{
    clients::{feed::HttpMessageFeed, kv::RedisSeenStore},
    config::Config,
    models::{
        health::{HealthCheckResponse, HealthStatus, ServiceHealth},
        status::ResolutionStatus,
    },
    pipeline::ResolutionPipeline,
};

pub struct HealthChecker {
    config: Config,
    pipeline: Arc<ResolutionPipeline>,
    seen_store: Option<Arc<RedisSeenStore>>,
    feed: Option<Arc<HttpMessageFeed>>,
}

impl HealthChecker {
    pub fn new(
        config: Config,
        pipeline: Arc<ResolutionPipeline>,
        seen_store: Option<Arc<RedisSeenStore>>,
        feed: Option<Arc<HttpMessageFeed>>,
    ) -> Self {
        Self {
            config,
            pipeline,
            seen_store,
            feed,
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("seen_store".to_string(), self.check_seen_store().await);
        checks.insert("message_feed".to_string(), self.check_feed().await);
        checks.insert("refresh_broker".to_string(), self.check_rabbitmq().await);

        let resolution = self.pipeline.status().await;
        checks.insert("resolution".to_string(), Self::check_resolution(resolution));

        HealthCheckResponse {
            status: Self::determine_overall_status(&checks),
            timestamp: Utc::now(),
            resolution,
            checks,
        }
    }

    async fn check_seen_store(&self) -> ServiceHealth {
        let Some(store) = self.seen_store.as_ref() else {
            return ServiceHealth::not_configured();
        };

        let start = Instant::now();
        match store.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Seen store health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Seen store health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    async fn check_feed(&self) -> ServiceHealth {
        let Some(feed) = self.feed.as_ref() else {
            return ServiceHealth::not_configured();
        };

        let start = Instant::now();
        match feed.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Message feed health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Message feed health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let Some(url) = self.config.rabbitmq_url.as_deref() else {
            return ServiceHealth::not_configured();
        };

        let start = Instant::now();
        match Connection::connect(url, ConnectionProperties::default()).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    fn check_resolution(status: ResolutionStatus) -> ServiceHealth {
        match status {
            ResolutionStatus::Failed => {
                ServiceHealth::degraded("Last resolution failed, showing stale messages".to_string())
            }
            ResolutionStatus::Hidden => {
                ServiceHealth::degraded("Messages features hidden".to_string())
            }
            _ => ServiceHealth::healthy(0),
        }
    }

    // Only the seen store is critical; every other dependency degrades.
    fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let seen_store_down = checks
            .get("seen_store")
            .is_some_and(|health| health.status == HealthStatus::Unhealthy);

        let has_problem = checks
            .values()
            .any(|health| health.status != HealthStatus::Healthy);

        if seen_store_down {
            HealthStatus::Unhealthy
        } else if has_problem {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
