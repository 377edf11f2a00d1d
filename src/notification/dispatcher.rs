use async_trait::async_trait;
use std::sync::Arc;

use super::telegram::{NotificationError, NotificationSink};
use super::templates::{render_order_paid, render_ship_assembled};
use crate::domain::order::{OrderPaidEvent, ShipAssembledEvent};
use crate::messaging::{decode_event, HandlerError, InboundMessage, MessageHandler};
use crate::metrics::Metrics;

/// Renders order events and delivers them to a single chat.
///
/// Delivery is attempted once per message; a failure goes back to the
/// consumer, which redelivers.
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    chat_id: i64,
    metrics: Arc<Metrics>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, chat_id: i64, metrics: Arc<Metrics>) -> Self {
        Self {
            sink,
            chat_id,
            metrics,
        }
    }

    pub async fn on_order_paid(&self, event: &OrderPaidEvent) -> Result<(), NotificationError> {
        let text = render_order_paid(event);
        self.deliver("order_paid", &text, event).await
    }

    pub async fn on_ship_assembled(&self, event: &ShipAssembledEvent) -> Result<(), NotificationError> {
        let text = render_ship_assembled(event);
        self.deliver("ship_assembled", &text, event).await
    }

    async fn deliver<E: OrderScoped>(&self, kind: &str, text: &str, event: &E) -> Result<(), NotificationError> {
        let result = self.sink.send(self.chat_id, text).await;
        self.metrics.record_notification(kind, result.is_ok());

        match &result {
            Ok(()) => tracing::info!(kind, order_id = %event.order_id(), "Notification sent"),
            Err(e) => tracing::error!(kind, order_id = %event.order_id(), error = %e, "Notification failed"),
        }
        result
    }
}

trait OrderScoped {
    fn order_id(&self) -> uuid::Uuid;
}

impl OrderScoped for OrderPaidEvent {
    fn order_id(&self) -> uuid::Uuid {
        self.order_id
    }
}

impl OrderScoped for ShipAssembledEvent {
    fn order_id(&self) -> uuid::Uuid {
        self.order_id
    }
}

fn delivery_failed(e: NotificationError) -> HandlerError {
    HandlerError::Failed(anyhow::Error::new(e).context("delivering notification"))
}

pub struct OrderPaidNotifier(pub Arc<NotificationDispatcher>);

#[async_trait]
impl MessageHandler for OrderPaidNotifier {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let event: OrderPaidEvent = decode_event(&message.payload)?;
        self.0.on_order_paid(&event).await.map_err(delivery_failed)
    }
}

pub struct ShipAssembledNotifier(pub Arc<NotificationDispatcher>);

#[async_trait]
impl MessageHandler for ShipAssembledNotifier {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let event: ShipAssembledEvent = decode_event(&message.payload)?;
        self.0.on_ship_assembled(&event).await.map_err(delivery_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::messaging::testing::inbound;
    use crate::messaging::{encode_event, ORDER_PAID_TOPIC, SHIP_ASSEMBLED_TOPIC};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(i64, String)>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotificationError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotificationError::Api {
                    code: 429,
                    description: "Too Many Requests".to_string(),
                });
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn dispatcher(sink: Arc<RecordingSink>) -> (Arc<NotificationDispatcher>, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        (
            Arc::new(NotificationDispatcher::new(sink, 555, metrics.clone())),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_order_paid_notification_sent_to_chat() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _) = dispatcher(sink.clone());
        let event = OrderPaidEvent::new(Uuid::new_v4(), Uuid::new_v4(), PaymentMethod::Card, Uuid::new_v4());

        OrderPaidNotifier(dispatcher)
            .handle(&inbound(ORDER_PAID_TOPIC, 0, 0, encode_event(&event).unwrap()))
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 555);
        assert!(sent[0].1.contains("Order paid!"));
        assert!(sent[0].1.contains(&event.transaction_id.to_string()));
    }

    #[tokio::test]
    async fn test_ship_assembled_notification_sent() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, metrics) = dispatcher(sink.clone());
        let event = ShipAssembledEvent {
            event_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            build_time_secs: 9,
        };

        ShipAssembledNotifier(dispatcher)
            .handle(&inbound(SHIP_ASSEMBLED_TOPIC, 3, 10, encode_event(&event).unwrap()))
            .await
            .unwrap();

        assert!(sink.sent.lock().unwrap()[0].1.contains("Build time: <b>9 sec</b>"));
        assert_eq!(
            metrics
                .notifications_sent
                .with_label_values(&["ship_assembled", "sent"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_requests_redelivery() {
        let sink = Arc::new(RecordingSink::default());
        sink.failing.store(true, Ordering::SeqCst);
        let (dispatcher, metrics) = dispatcher(sink.clone());
        let event = OrderPaidEvent::new(Uuid::new_v4(), Uuid::new_v4(), PaymentMethod::Sbp, Uuid::new_v4());

        let err = OrderPaidNotifier(dispatcher)
            .handle(&inbound(ORDER_PAID_TOPIC, 0, 0, encode_event(&event).unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Failed(_)));
        assert_eq!(
            metrics
                .notifications_sent
                .with_label_values(&["order_paid", "failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_malformed_event_not_sent() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _) = dispatcher(sink.clone());

        let err = ShipAssembledNotifier(dispatcher)
            .handle(&inbound(SHIP_ASSEMBLED_TOPIC, 0, 0, b"not json".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
