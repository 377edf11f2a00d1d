// ============================================================================
// Messaging - event bus plumbing shared by all services
// ============================================================================
//
// - codec:    JSON encoding and strict decoding of integration events
// - redpanda: producer (EventPublisher) and consumer over rdkafka
// - dispatch: per-partition workers giving in-order, at-least-once handling
//
// ============================================================================

pub mod codec;
pub mod consumer;
pub mod dispatch;
pub mod redpanda;

use async_trait::async_trait;

pub use codec::{decode_event, encode_event, EventCodecError, IntegrationEvent};
pub use consumer::{ConsumerConfig, RedpandaConsumer};
pub use dispatch::{Offer, OffsetStore, PartitionWorkers};
pub use redpanda::RedpandaPublisher;

pub const ORDER_PAID_TOPIC: &str = "order.paid";
pub const SHIP_ASSEMBLED_TOPIC: &str = "ship.assembled";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EventCodecError),

    #[error("circuit breaker open for {0}")]
    CircuitOpen(String),

    #[error("failed to publish to {topic}: {reason}")]
    Send { topic: String, reason: String },
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Encode `event` and publish it keyed by its partition key.
pub async fn publish_event<E: IntegrationEvent>(
    publisher: &dyn EventPublisher,
    topic: &str,
    event: &E,
) -> Result<(), PublishError> {
    let payload = encode_event(event)?;
    publisher.publish(topic, &event.partition_key(), &payload).await
}

/// A message detached from the consumer, owned by a partition worker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Decode(#[from] EventCodecError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Handles one message. An `Err` means "redeliver".
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}
