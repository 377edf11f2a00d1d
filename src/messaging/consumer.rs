use kameo::actor::ActorRef;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::TopicPartitionList;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::dispatch::{report_health, Offer, OffsetStore, PartitionWorkers, WorkerContext};
use super::{InboundMessage, MessageHandler};
use crate::actors::{HealthMonitorActor, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::RetryConfig;

// ============================================================================
// Redpanda Consumer
// ============================================================================
//
// Offsets are committed by the client's auto-commit timer, but only offsets
// explicitly stored after a successful handler run are eligible
// (enable.auto.offset.store=false). A crash before the store means the
// message is delivered again.
//
// The receive loop never waits on a worker. A partition whose worker is
// backed up is paused and resumed once its parked messages are queued.
//
// ============================================================================

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);
const BACKLOG_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
}

pub struct RedpandaConsumer {
    consumer: Arc<StreamConsumer>,
    config: ConsumerConfig,
}

struct ConsumerOffsets(Arc<StreamConsumer>);

impl OffsetStore for ConsumerOffsets {
    fn mark_processed(&self, message: &InboundMessage) -> anyhow::Result<()> {
        // The stored offset is the next one to read.
        self.0
            .store_offset(&message.topic, message.partition, message.offset + 1)
            .map_err(|e| anyhow::anyhow!("store_offset failed: {}", e))
    }
}

fn inbound_from(message: &OwnedMessage) -> InboundMessage {
    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

impl RedpandaConsumer {
    pub fn new(config: ConsumerConfig) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Redpanda consumer: {}", e))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| anyhow::anyhow!("Failed to subscribe to {}: {}", config.topic, e))?;

        tracing::info!(
            topic = %config.topic,
            group_id = %config.group_id,
            "Subscribed to topic"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            config,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    async fn partition_count(&self) -> usize {
        let consumer = self.consumer.clone();
        let topic = self.config.topic.clone();

        let lookup = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)
                .map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .find(|t| t.name() == topic)
                        .map(|t| t.partitions().len())
                        .unwrap_or(0)
                })
        })
        .await;

        match lookup {
            Ok(Ok(count)) if count > 0 => count,
            Ok(Ok(_)) => {
                tracing::warn!(topic = %self.config.topic, "Topic has no partitions yet, using one worker");
                1
            }
            Ok(Err(e)) => {
                tracing::warn!(topic = %self.config.topic, error = %e, "Metadata lookup failed, using one worker");
                1
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metadata task failed, using one worker");
                1
            }
        }
    }

    fn partition_list(&self, partition: i32) -> TopicPartitionList {
        let mut list = TopicPartitionList::new();
        list.add_partition(&self.config.topic, partition);
        list
    }

    fn pause(&self, partition: i32) {
        match self.consumer.pause(&self.partition_list(partition)) {
            Ok(()) => tracing::info!(
                topic = %self.config.topic,
                partition = partition,
                "Partition worker backed up, pausing partition"
            ),
            Err(e) => tracing::warn!(
                topic = %self.config.topic,
                partition = partition,
                error = %e,
                "Failed to pause partition, parking its messages"
            ),
        }
    }

    fn resume(&self, partition: i32) {
        match self.consumer.resume(&self.partition_list(partition)) {
            Ok(()) => tracing::info!(topic = %self.config.topic, partition = partition, "Resuming partition"),
            Err(e) => tracing::error!(
                topic = %self.config.topic,
                partition = partition,
                error = %e,
                "Failed to resume partition"
            ),
        }
    }

    /// Pull messages until `cancel` fires, handing each to its partition's
    /// worker. Returns after the workers have drained, or an error when a
    /// worker stopped on its own.
    pub async fn run(
        self,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<Metrics>,
        health: Option<ActorRef<HealthMonitorActor>>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let partitions = self.partition_count().await;
        let component = format!("consumer:{}", self.config.topic);
        let workers_cancel = cancel.child_token();

        let mut workers = PartitionWorkers::spawn(
            partitions,
            WorkerContext {
                handler,
                offsets: Arc::new(ConsumerOffsets(self.consumer.clone())),
                metrics,
                retry: RetryConfig::redelivery(),
                cancel: workers_cancel.clone(),
                health: health.clone(),
            },
        );

        report_health(health.as_ref(), component.clone(), HealthStatus::Healthy).await;

        tracing::info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            workers = workers.len(),
            "Consumer started"
        );

        let mut backlog_tick = tokio::time::interval(BACKLOG_POLL_INTERVAL);
        backlog_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                _ = backlog_tick.tick() => {
                    if let Some(worker) = workers.stopped_worker() {
                        break Err(anyhow::anyhow!("partition worker {} stopped", worker));
                    }
                    match workers.drain_backlog() {
                        Ok(drained) => drained.into_iter().for_each(|partition| self.resume(partition)),
                        Err(e) => break Err(e),
                    }
                }
                received = self.consumer.recv() => match received {
                    Ok(message) => {
                        let message = inbound_from(&message.detach());
                        tracing::debug!(
                            topic = %message.topic,
                            partition = message.partition,
                            offset = message.offset,
                            "Received message"
                        );
                        match workers.offer(message) {
                            Ok(Offer::Parked { partition, newly: true }) => self.pause(partition),
                            Ok(_) => {}
                            Err(e) => break Err(e),
                        }
                    }
                    Err(e) => {
                        tracing::error!(topic = %self.config.topic, error = %e, "Redpanda consumer error");
                        report_health(
                            health.as_ref(),
                            component.clone(),
                            HealthStatus::Degraded(e.to_string()),
                        )
                        .await;
                        tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    }
                },
            }
        };

        let outcome = match outcome {
            Err(_) if cancel.is_cancelled() => Ok(()),
            other => other,
        };

        if let Err(e) = &outcome {
            tracing::error!(topic = %self.config.topic, error = %e, "Consumer stopped unexpectedly");
            report_health(health.as_ref(), component, HealthStatus::Unhealthy(e.to_string())).await;
            workers_cancel.cancel();
        }

        tracing::info!(topic = %self.config.topic, "Consumer stopped pulling, draining workers");
        workers.shutdown().await;
        outcome
    }
}
