use futures_util::FutureExt;
use kameo::actor::ActorRef;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{HandlerError, InboundMessage, MessageHandler};
use crate::actors::{HealthMonitorActor, HealthStatus, UpdateHealth};
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};

// ============================================================================
// Partition Workers
// ============================================================================
//
// One worker task per partition slot. Messages of a partition always land
// on the same worker and are handled strictly one after another, so a slow
// message only holds back its own partition.
//
// Offering a message never waits. When a worker queue is full the message
// is parked in that partition's backlog and the caller pauses the
// partition; later messages of a parked partition join the backlog behind
// it. `drain_backlog` moves parked messages forward as the worker catches
// up and reports the partitions that can be resumed.
//
// A failing message is retried in place (exponential backoff, no cutoff)
// and its offset is stored only once the handler succeeds. A panicking
// handler counts as a failure. Cancellation stops pulling new messages and
// interrupts a backoff wait; the message being handled is allowed to finish.
//
// ============================================================================

const WORKER_QUEUE_DEPTH: usize = 64;

/// Marks a message as processed so its offset gets committed.
pub trait OffsetStore: Send + Sync {
    fn mark_processed(&self, message: &InboundMessage) -> anyhow::Result<()>;
}

pub struct WorkerContext {
    pub handler: Arc<dyn MessageHandler>,
    pub offsets: Arc<dyn OffsetStore>,
    pub metrics: Arc<Metrics>,
    pub retry: RetryConfig,
    pub cancel: CancellationToken,
    pub health: Option<ActorRef<HealthMonitorActor>>,
}

/// Result of handing a message to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The partition's worker is backed up. `newly` is true for the first
    /// message parked, which is when the partition should be paused.
    Parked { partition: i32, newly: bool },
}

pub struct PartitionWorkers {
    senders: Vec<mpsc::Sender<InboundMessage>>,
    handles: Vec<JoinHandle<()>>,
    backlog: HashMap<i32, VecDeque<InboundMessage>>,
}

impl PartitionWorkers {
    pub fn spawn(count: usize, ctx: WorkerContext) -> Self {
        let count = count.max(1);
        let ctx = Arc::new(ctx);

        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(index, rx, ctx.clone())));
        }

        tracing::info!(workers = count, "Partition workers started");
        Self {
            senders,
            handles,
            backlog: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    fn slot(&self, partition: i32) -> usize {
        partition.rem_euclid(self.senders.len() as i32) as usize
    }

    /// Queue a message on its partition's worker without waiting. Fails
    /// once the worker has stopped.
    pub fn offer(&mut self, message: InboundMessage) -> anyhow::Result<Offer> {
        let partition = message.partition;
        if let Some(parked) = self.backlog.get_mut(&partition) {
            parked.push_back(message);
            return Ok(Offer::Parked { partition, newly: false });
        }

        let slot = self.slot(partition);
        match self.senders[slot].try_send(message) {
            Ok(()) => Ok(Offer::Queued),
            Err(TrySendError::Full(message)) => {
                tracing::debug!(
                    partition = partition,
                    offset = message.offset,
                    "Partition worker backed up, parking message"
                );
                self.backlog.entry(partition).or_default().push_back(message);
                Ok(Offer::Parked { partition, newly: true })
            }
            Err(TrySendError::Closed(message)) => Err(anyhow::anyhow!(
                "partition worker {} stopped, dropping offset {}",
                slot,
                message.offset
            )),
        }
    }

    /// Move parked messages onto their workers while there is room.
    /// Returns the partitions whose backlog emptied.
    pub fn drain_backlog(&mut self) -> anyhow::Result<Vec<i32>> {
        let mut drained = Vec::new();
        let partitions: Vec<i32> = self.backlog.keys().copied().collect();

        for partition in partitions {
            let slot = self.slot(partition);
            let Some(parked) = self.backlog.get_mut(&partition) else {
                continue;
            };
            while let Some(message) = parked.pop_front() {
                match self.senders[slot].try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => {
                        parked.push_front(message);
                        break;
                    }
                    Err(TrySendError::Closed(message)) => {
                        return Err(anyhow::anyhow!(
                            "partition worker {} stopped, dropping offset {}",
                            slot,
                            message.offset
                        ));
                    }
                }
            }
            if parked.is_empty() {
                self.backlog.remove(&partition);
                drained.push(partition);
            }
        }

        Ok(drained)
    }

    pub fn parked(&self, partition: i32) -> usize {
        self.backlog.get(&partition).map_or(0, VecDeque::len)
    }

    /// Index of a worker that exited on its own, if any.
    pub fn stopped_worker(&self) -> Option<usize> {
        self.senders.iter().position(mpsc::Sender::is_closed)
    }

    /// Close the queues and wait for every worker to exit. Parked messages
    /// are left uncommitted.
    pub async fn shutdown(self) {
        let parked: usize = self.backlog.values().map(VecDeque::len).sum();
        if parked > 0 {
            tracing::info!(parked = parked, "Leaving parked messages for redelivery");
        }
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Partition worker panicked");
            }
        }
        tracing::info!("Partition workers stopped");
    }
}

async fn run_worker(index: usize, mut rx: mpsc::Receiver<InboundMessage>, ctx: Arc<WorkerContext>) {
    loop {
        let message = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        if !process(&ctx, &message).await {
            break;
        }
    }

    tracing::debug!(worker = index, "Partition worker exiting");
}

async fn handle_guarded(ctx: &WorkerContext, message: &InboundMessage) -> Result<(), HandlerError> {
    match AssertUnwindSafe(ctx.handler.handle(message)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(anyhow::anyhow!("handler panicked: {}", reason).into())
        }
    }
}

/// Returns false when the worker must stop without moving past `message`.
async fn process(ctx: &WorkerContext, message: &InboundMessage) -> bool {
    let degraded = AtomicBool::new(false);
    let degraded = &degraded;

    let outcome = retry_with_backoff(&ctx.retry, &ctx.cancel, |attempt| async move {
        let started = Instant::now();
        let result = handle_guarded(ctx, message).await;
        ctx.metrics
            .record_consumed(&message.topic, started.elapsed().as_secs_f64(), result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                attempt = attempt,
                error = %e,
                "Handler failed, message will be redelivered"
            );
            if !degraded.swap(true, Ordering::SeqCst) {
                report(ctx, message, HealthStatus::Degraded(format!(
                    "redelivering partition {} offset {}: {}",
                    message.partition, message.offset, e
                )))
                .await;
            }
        }
        result
    })
    .await;

    match outcome {
        RetryResult::Success(()) => {
            if degraded.load(Ordering::SeqCst) {
                report(ctx, message, HealthStatus::Healthy).await;
            }
            if let Err(e) = ctx.offsets.mark_processed(message) {
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to store offset, message may be redelivered"
                );
            }
            true
        }
        RetryResult::Failed(e) => {
            tracing::error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Giving up on message, stopping partition worker"
            );
            report(ctx, message, HealthStatus::Unhealthy(format!(
                "partition {} stopped at offset {}: {}",
                message.partition, message.offset, e
            )))
            .await;
            false
        }
        RetryResult::Cancelled => {
            tracing::info!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Shutdown during redelivery, message left uncommitted"
            );
            false
        }
    }
}

async fn report(ctx: &WorkerContext, message: &InboundMessage, status: HealthStatus) {
    report_health(ctx.health.as_ref(), format!("consumer:{}", message.topic), status).await;
}

pub(crate) async fn report_health(
    health: Option<&ActorRef<HealthMonitorActor>>,
    component: String,
    status: HealthStatus,
) {
    if let Some(health) = health {
        if let Err(e) = health.tell(UpdateHealth::new(component, status)).await {
            tracing::debug!(error = %e, "Health monitor unavailable");
        }
    }
}
