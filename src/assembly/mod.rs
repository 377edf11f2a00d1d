use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::order::{OrderPaidEvent, ShipAssembledEvent};
use crate::messaging::{
    decode_event, publish_event, EventPublisher, HandlerError, InboundMessage, MessageHandler,
    SHIP_ASSEMBLED_TOPIC,
};
use crate::metrics::Metrics;

// ============================================================================
// Assembly Worker
// ============================================================================
//
// Consumes `order.paid`, simulates building the ship and publishes exactly
// one `ship.assembled` per processed message. The simulated build blocks
// only the partition worker it runs on.
//
// Stateless: a redelivered OrderPaid is built and announced again.
//
// ============================================================================

/// Picks how long a build takes, in whole seconds.
pub trait BuildTimer: Send + Sync {
    fn next_build_secs(&self) -> u64;
}

/// Uniform over `[min_secs, max_secs]`, both inclusive.
pub struct RandomBuildTimer {
    min_secs: u64,
    max_secs: u64,
}

impl RandomBuildTimer {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
        }
    }
}

impl Default for RandomBuildTimer {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

impl BuildTimer for RandomBuildTimer {
    fn next_build_secs(&self) -> u64 {
        rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
    }
}

pub struct AssemblyWorker {
    publisher: Arc<dyn EventPublisher>,
    timer: Arc<dyn BuildTimer>,
    metrics: Arc<Metrics>,
    ship_assembled_topic: String,
    /// Wall-clock length of one build second.
    second: Duration,
}

impl AssemblyWorker {
    pub fn new(publisher: Arc<dyn EventPublisher>, timer: Arc<dyn BuildTimer>, metrics: Arc<Metrics>) -> Self {
        Self {
            publisher,
            timer,
            metrics,
            ship_assembled_topic: SHIP_ASSEMBLED_TOPIC.to_string(),
            second: Duration::from_secs(1),
        }
    }

    pub fn with_ship_assembled_topic(mut self, topic: impl Into<String>) -> Self {
        self.ship_assembled_topic = topic.into();
        self
    }

    pub fn with_time_unit(mut self, second: Duration) -> Self {
        self.second = second;
        self
    }

    /// Saturates instead of wrapping for out-of-range build times.
    fn build_duration(&self, build_secs: u64) -> Duration {
        u32::try_from(build_secs)
            .ok()
            .and_then(|secs| self.second.checked_mul(secs))
            .unwrap_or(Duration::MAX)
    }

    /// Build the ship for `paid` and announce it.
    pub async fn on_order_paid(&self, paid: &OrderPaidEvent) -> Result<ShipAssembledEvent, HandlerError> {
        let build_secs = self.timer.next_build_secs();

        tracing::info!(
            order_id = %paid.order_id,
            event_id = %paid.event_id,
            build_time_secs = build_secs,
            "Assembling ship"
        );
        tokio::time::sleep(self.build_duration(build_secs)).await;

        let assembled = ShipAssembledEvent::from_paid(paid, build_secs);
        let result = publish_event(self.publisher.as_ref(), &self.ship_assembled_topic, &assembled).await;
        self.metrics
            .record_publish(&self.ship_assembled_topic, result.is_ok());
        result?;

        tracing::info!(
            order_id = %assembled.order_id,
            build_time_secs = build_secs,
            "Ship assembled"
        );
        Ok(assembled)
    }
}

#[async_trait]
impl MessageHandler for AssemblyWorker {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let paid: OrderPaidEvent = decode_event(&message.payload)?;
        self.on_order_paid(&paid).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::messaging::testing::{inbound, RecordingPublisher};
    use crate::messaging::{encode_event, ORDER_PAID_TOPIC};
    use uuid::Uuid;

    struct FixedTimer(u64);

    impl BuildTimer for FixedTimer {
        fn next_build_secs(&self) -> u64 {
            self.0
        }
    }

    fn worker(publisher: Arc<RecordingPublisher>, timer: Arc<dyn BuildTimer>) -> AssemblyWorker {
        AssemblyWorker::new(publisher, timer, Arc::new(Metrics::new().unwrap()))
            .with_time_unit(Duration::from_millis(1))
    }

    fn paid() -> OrderPaidEvent {
        OrderPaidEvent::new(Uuid::new_v4(), Uuid::new_v4(), PaymentMethod::Sbp, Uuid::new_v4())
    }

    #[test]
    fn test_random_build_time_within_bounds() {
        let timer = RandomBuildTimer::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            let secs = timer.next_build_secs();
            assert!((1..=10).contains(&secs));
            seen.insert(secs);
        }
        assert!(seen.contains(&1));
        assert!(seen.contains(&10));
    }

    #[test]
    fn test_build_duration_scales_without_wrapping() {
        let publisher = Arc::new(RecordingPublisher::new());
        let worker = AssemblyWorker::new(publisher, Arc::new(FixedTimer(1)), Arc::new(Metrics::new().unwrap()));

        assert_eq!(worker.build_duration(7), Duration::from_secs(7));
        assert_eq!(worker.build_duration(u64::from(u32::MAX) + 1), Duration::MAX);
        assert_eq!(
            worker.with_time_unit(Duration::from_millis(10)).build_duration(3),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn test_random_build_time_bounds_normalised() {
        let timer = RandomBuildTimer::new(0, 0);
        assert_eq!(timer.next_build_secs(), 1);
    }

    #[tokio::test]
    async fn test_publishes_exactly_one_ship_assembled() {
        let publisher = Arc::new(RecordingPublisher::new());
        let worker = worker(publisher.clone(), Arc::new(RandomBuildTimer::default()));
        let event = paid();

        worker
            .handle(&inbound(ORDER_PAID_TOPIC, 0, 0, encode_event(&event).unwrap()))
            .await
            .unwrap();

        let published: Vec<ShipAssembledEvent> = publisher.decoded(SHIP_ASSEMBLED_TOPIC);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].order_id, event.order_id);
        assert_eq!(published[0].user_id, event.user_id);
        assert_eq!(published[0].event_id, event.event_id);
        assert!((1..=10).contains(&published[0].build_time_secs));
        assert_eq!(publisher.records()[0].key, event.order_id.to_string());
    }

    #[tokio::test]
    async fn test_build_time_recorded_verbatim() {
        let publisher = Arc::new(RecordingPublisher::new());
        let worker = worker(publisher.clone(), Arc::new(FixedTimer(7)));

        let assembled = worker.on_order_paid(&paid()).await.unwrap();

        assert_eq!(assembled.build_time_secs, 7);
    }

    #[tokio::test]
    async fn test_publish_failure_requests_redelivery() {
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.set_failing(true);
        let worker = worker(publisher.clone(), Arc::new(FixedTimer(1)));

        let err = worker
            .handle(&inbound(ORDER_PAID_TOPIC, 0, 0, encode_event(&paid()).unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Publish(_)));
    }

    #[tokio::test]
    async fn test_malformed_order_paid_rejected() {
        let publisher = Arc::new(RecordingPublisher::new());
        let worker = worker(publisher.clone(), Arc::new(FixedTimer(1)));

        let err = worker
            .handle(&inbound(ORDER_PAID_TOPIC, 0, 0, br#"{"order_uuid":42}"#.to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
        assert!(publisher.records().is_empty());
    }
}
