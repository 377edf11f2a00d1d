use async_trait::async_trait;
use std::sync::Arc;

use super::events::ShipAssembledEvent;
use super::service::OrderService;
use crate::messaging::{decode_event, HandlerError, InboundMessage, MessageHandler};

/// Applies `ship.assembled` messages to the order store.
pub struct ShipAssembledHandler {
    service: Arc<OrderService>,
}

impl ShipAssembledHandler {
    pub fn new(service: Arc<OrderService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ShipAssembledHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let event: ShipAssembledEvent = decode_event(&message.payload)?;

        tracing::debug!(
            order_id = %event.order_id,
            event_id = %event.event_id,
            offset = message.offset,
            "Processing ShipAssembled"
        );

        self.service
            .on_ship_assembled(&event)
            .await
            .map(|_| ())
            .map_err(|e| HandlerError::Failed(anyhow::Error::new(e).context("applying ShipAssembled")))
    }
}
