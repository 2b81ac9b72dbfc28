use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer,
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tracing::{debug, info, warn};

use crate::pipeline::ResolutionPipeline;

/// Consumes the refresh queue; every delivery starts a fresh resolution cycle.
pub struct RefreshListener {
    _connection: Connection,
    channel: Channel,
    queue_name: String,
}

impl RefreshListener {
    pub async fn connect(rabbitmq_url: &str, queue_name: &str) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        // Refresh requests carry no payload worth parallelising over.
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare refresh queue: {}", e))?;

        info!(queue = queue_name, "Refresh queue declared");

        Ok(Self {
            _connection: connection,
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    async fn create_consumer(&self) -> Result<Consumer, Error> {
        self.channel
            .basic_consume(
                &self.queue_name,
                "messages_refresh",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))
    }

    pub async fn run(self, pipeline: Arc<ResolutionPipeline>) -> Result<(), Error> {
        let mut consumer = self.create_consumer().await?;

        info!(queue = %self.queue_name, "Listening for refresh signals");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    warn!(error = %e, "Refresh delivery failed");
                    continue;
                }
            };

            debug!(delivery_tag = delivery.delivery_tag, "Refresh signal received");

            if let Err(e) = pipeline.request_refresh().await {
                warn!(error = %e, "Refresh triggered by signal did not resolve");
            }

            if let Err(e) = self
                .channel
                .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
                .await
            {
                warn!(error = %e, "Failed to acknowledge refresh signal");
            }
        }

        info!("Refresh consumer stream ended");
        Ok(())
    }
}
