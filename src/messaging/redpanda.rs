use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;

use super::{EventPublisher, PublishError};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Redpanda producer. Waits for the broker ack on every publish.
pub struct RedpandaPublisher {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaPublisher {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Redpanda producer: {}", e))?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        tracing::info!(brokers = %brokers, "Redpanda producer created");

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("redpanda", cb_config),
        })
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.circuit_breaker.clone()
    }

    /// Wait for queued messages to be delivered.
    pub fn flush(&self, timeout: Duration) -> anyhow::Result<()> {
        self.producer
            .flush(timeout)
            .map_err(|e| anyhow::anyhow!("Failed to flush Redpanda producer: {}", e))
    }
}

#[async_trait]
impl EventPublisher for RedpandaPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, DELIVERY_TIMEOUT)
                    .await
                    .map_err(|(e, _)| e.to_string())
            })
            .await;

        match result {
            Ok(_) => {
                tracing::info!(topic = %topic, key = %key, "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %topic, "Circuit breaker open - Redpanda unavailable");
                Err(PublishError::CircuitOpen("redpanda".to_string()))
            }
            Err(CircuitBreakerError::OperationFailed(reason)) => {
                tracing::error!(error = %reason, topic = %topic, key = %key, "Failed to publish to Redpanda");
                Err(PublishError::Send {
                    topic: topic.to_string(),
                    reason,
                })
            }
        }
    }
}
