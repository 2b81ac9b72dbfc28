use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use messages_service::{
    api::{AppState, run_api_server},
    classifier::{AllMessages, AudiencePredicate, Classifier},
    clients::{
        feed::{HttpDataPredicate, HttpGroupPredicate, HttpMessageFeed, HttpTitlePredicate},
        health::HealthChecker,
        kv::{InMemorySeenStore, RedisSeenStore},
        rbmq::RefreshListener,
    },
    config::Config,
    pipeline::{ResolutionPipeline, StaticMessages},
    seen_state::KeyValueStore,
    utils::init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    init_tracing();

    let config = Config::load()?;

    let redis_store = match config.redis_url.as_deref() {
        Some(_) => match RedisSeenStore::connect(&config).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "Seen store unavailable, keeping seen ids for this session only");
                None
            }
        },
        None => None,
    };
    let kv: Arc<dyn KeyValueStore> = match redis_store.clone() {
        Some(store) => store,
        None => Arc::new(InMemorySeenStore::new()),
    };

    let (pipeline, feed) = match config.messages_endpoint() {
        Ok(url) => {
            let feed = Arc::new(HttpMessageFeed::new(&config, url)?);

            let group: Arc<dyn AudiencePredicate> =
                match (config.disable_group_filtering, config.group_url.as_deref()) {
                    (false, Some(group_url)) => Arc::new(HttpGroupPredicate::new(&config, group_url)?),
                    (false, None) => {
                        warn!("GROUP_URL is not configured, messages are not filtered by group");
                        Arc::new(AllMessages)
                    }
                    (true, _) => Arc::new(AllMessages),
                };
            let classifier = Classifier::new(
                group,
                Arc::new(HttpDataPredicate::new(&config)?),
                Arc::new(HttpTitlePredicate::new(&config)?),
            );

            let pipeline =
                ResolutionPipeline::new(feed.clone(), classifier, kv, config.event_capacity);
            (pipeline, Some(feed))
        }
        Err(reason) => {
            warn!(reason = %reason, "Messages features disabled");
            let classifier = Classifier::new(
                Arc::new(AllMessages),
                Arc::new(AllMessages),
                Arc::new(AllMessages),
            );
            let pipeline = ResolutionPipeline::new(
                Arc::new(StaticMessages(Vec::new())),
                classifier,
                kv,
                config.event_capacity,
            )
            .with_feature_disabled(reason);
            (pipeline, None)
        }
    };
    let pipeline = Arc::new(pipeline);

    if let Err(e) = pipeline.refresh().await {
        warn!(error = %e, "Initial message resolution failed");
    }

    if let Some(rabbitmq_url) = config.rabbitmq_url.as_deref() {
        match RefreshListener::connect(rabbitmq_url, &config.refresh_queue_name).await {
            Ok(listener) => {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    if let Err(e) = listener.run(pipeline).await {
                        warn!(error = %e, "Refresh listener stopped");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Refresh signals unavailable"),
        }
    }

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config.clone(), Arc::clone(&pipeline), redis_store, feed),
        pipeline,
        render_limit: config.render_limit,
    });

    info!(port = config.server_port, "Messages service ready");

    run_api_server(config.server_port, state)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))
}
