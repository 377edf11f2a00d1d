use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::codec::{EventCodecError, IntegrationEvent};
use super::value_objects::PaymentMethod;

// ============================================================================
// Order Integration Events - payloads carried on the bus
// ============================================================================
//
// Both events are partitioned by order id. The ShipAssembled event reuses
// the event id of the OrderPaid event that triggered it for correlation.
//
// ============================================================================

/// Published by the order service after a payment has been recorded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderPaidEvent {
    #[serde(rename = "event_uuid")]
    pub event_id: Uuid,
    #[serde(rename = "order_uuid")]
    pub order_id: Uuid,
    #[serde(rename = "user_uuid")]
    pub user_id: Uuid,
    pub payment_method: PaymentMethod,
    #[serde(rename = "transaction_uuid")]
    pub transaction_id: Uuid,
}

impl OrderPaidEvent {
    pub fn new(
        order_id: Uuid,
        user_id: Uuid,
        payment_method: PaymentMethod,
        transaction_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id,
            user_id,
            payment_method,
            transaction_id,
        }
    }
}

impl IntegrationEvent for OrderPaidEvent {
    fn event_type() -> &'static str {
        "OrderPaid"
    }

    fn partition_key(&self) -> String {
        self.order_id.to_string()
    }
}

/// Published by the assembly worker once the simulated build finished.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShipAssembledEvent {
    #[serde(rename = "event_uuid")]
    pub event_id: Uuid,
    #[serde(rename = "order_uuid")]
    pub order_id: Uuid,
    #[serde(rename = "user_uuid")]
    pub user_id: Uuid,
    #[serde(rename = "build_time_sec")]
    pub build_time_secs: u64,
}

impl ShipAssembledEvent {
    pub fn from_paid(paid: &OrderPaidEvent, build_time_secs: u64) -> Self {
        Self {
            event_id: paid.event_id,
            order_id: paid.order_id,
            user_id: paid.user_id,
            build_time_secs,
        }
    }
}

impl IntegrationEvent for ShipAssembledEvent {
    fn event_type() -> &'static str {
        "ShipAssembled"
    }

    fn partition_key(&self) -> String {
        self.order_id.to_string()
    }

    fn validate(&self) -> Result<(), EventCodecError> {
        if self.build_time_secs == 0 {
            return Err(EventCodecError::Invalid {
                event_type: Self::event_type(),
                reason: "build_time_sec must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
