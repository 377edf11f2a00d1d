use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::aggregate::{AssemblyOutcome, Order};
use super::errors::ServiceError;
use super::events::{OrderPaidEvent, ShipAssembledEvent};
use super::value_objects::{OrderStatus, PaymentMethod};
use crate::client::{InventoryClient, PaymentClient};
use crate::messaging::{publish_event, EventPublisher, ORDER_PAID_TOPIC};
use crate::metrics::Metrics;
use crate::store::{OrderRepository, StoreError};
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};

// ============================================================================
// Order Service - the order lifecycle state machine
// ============================================================================
//
// Orchestrates: Store read → Aggregate rule → Collaborator call → Store write
//               → Event publish
//
// Every write is conditional on the version that was read. The only write
// retried here is the PAID write after a successful charge: the charge has
// happened, so losing a version race re-reads and tries again while the
// order is still payable. Everything else surfaces `Conflict`.
//
// ============================================================================

const DEFAULT_PAID_WRITE_ATTEMPTS: u32 = 3;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => ServiceError::OrderAlreadyExists(id),
            StoreError::NotFound(id) => ServiceError::OrderNotFound(id),
            StoreError::Conflict { id, .. } => ServiceError::Conflict(id),
            StoreError::Backend(e) => ServiceError::Internal(e),
        }
    }
}

pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryClient>,
    payment: Arc<dyn PaymentClient>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
    order_paid_topic: String,
    paid_write_retry: RetryConfig,
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryClient>,
        payment: Arc<dyn PaymentClient>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            inventory,
            payment,
            publisher,
            metrics,
            order_paid_topic: ORDER_PAID_TOPIC.to_string(),
            paid_write_retry: RetryConfig::bounded(
                DEFAULT_PAID_WRITE_ATTEMPTS,
                Duration::from_millis(20),
            ),
        }
    }

    pub fn with_order_paid_topic(mut self, topic: impl Into<String>) -> Self {
        self.order_paid_topic = topic.into();
        self
    }

    pub fn with_paid_write_retry(mut self, retry: RetryConfig) -> Self {
        self.paid_write_retry = retry;
        self
    }

    fn internal(&self, operation: &'static str, err: ServiceError) -> ServiceError {
        if let ServiceError::Internal(e) = &err {
            tracing::error!(operation = operation, error = ?e, "Order store failure");
        }
        err
    }

    async fn load(&self, order_id: Uuid, operation: &'static str) -> Result<Order, ServiceError> {
        self.repository
            .get(order_id)
            .await
            .map_err(|e| self.internal(operation, e.into()))
    }

    // ------------------------------------------------------------------------
    // CreateOrder
    // ------------------------------------------------------------------------

    /// Validate every part against inventory, then persist a new
    /// PENDING_PAYMENT order. Nothing is written if any part is unknown.
    pub async fn create_order(&self, user_id: Uuid, part_ids: Vec<Uuid>) -> Result<Order, ServiceError> {
        if part_ids.is_empty() {
            return Err(ServiceError::EmptyParts);
        }

        let mut checked = HashSet::new();
        for part_id in &part_ids {
            if !checked.insert(*part_id) {
                continue;
            }
            match self.inventory.get_part(*part_id).await {
                Ok(part) => {
                    tracing::debug!(part_id = %part_id, name = %part.name, price = part.price, "Part found");
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        part_id = %part_id,
                        error = %e,
                        "Inventory lookup failed, rejecting order"
                    );
                    return Err(ServiceError::PartNotFound(*part_id));
                }
            }
        }

        let order = Order::new(Uuid::new_v4(), user_id, part_ids)?;
        self.repository
            .create(&order)
            .await
            .map_err(|e| self.internal("create_order", e.into()))?;

        self.metrics.record_order_created();
        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            parts = order.part_ids().len(),
            "Order created"
        );
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // GetOrder / ListOrders
    // ------------------------------------------------------------------------

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.load(order_id, "get_order").await
    }

    pub async fn list_orders(&self, limit: usize, offset: usize) -> Result<Vec<Order>, ServiceError> {
        self.repository
            .list(limit, offset)
            .await
            .map_err(|e| self.internal("list_orders", e.into()))
    }

    // ------------------------------------------------------------------------
    // PayOrder
    // ------------------------------------------------------------------------

    /// Charge a PENDING_PAYMENT order, mark it PAID and announce it on the
    /// bus. Returns the processor's transaction id.
    pub async fn pay_order(&self, order_id: Uuid, method: PaymentMethod) -> Result<Uuid, ServiceError> {
        let order = self.load(order_id, "pay_order").await?;

        if let Err(e) = order.ensure_payable() {
            self.metrics.record_payment("invalid_status");
            tracing::warn!(order_id = %order_id, status = %order.status, "Order is not payable");
            return Err(e.into());
        }

        let transaction_id = match self.payment.pay(order.id, order.user_id, method).await {
            Ok(tx) => tx,
            Err(e) => {
                self.metrics.record_payment("failed");
                tracing::error!(order_id = %order_id, method = %method, error = %e, "Payment processor failed");
                return Err(ServiceError::PaymentFailed(e.to_string()));
            }
        };

        let stored = match self.record_payment(&order, transaction_id, method).await {
            Ok(stored) => stored,
            Err(e) => {
                self.metrics.record_payment("conflict");
                tracing::error!(
                    order_id = %order_id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "Payment charged but order could not be marked PAID, needs reconciliation"
                );
                return Err(e);
            }
        };

        self.metrics.record_payment("paid");
        self.metrics
            .record_transition(OrderStatus::PendingPayment.as_str(), OrderStatus::Paid.as_str());
        tracing::info!(
            order_id = %stored.id,
            transaction_id = %transaction_id,
            method = %method,
            version = stored.version,
            "Order paid"
        );

        let event = OrderPaidEvent::new(stored.id, stored.user_id, method, transaction_id);
        match publish_event(self.publisher.as_ref(), &self.order_paid_topic, &event).await {
            Ok(()) => {
                self.metrics.record_publish(&self.order_paid_topic, true);
                tracing::info!(order_id = %stored.id, event_id = %event.event_id, "OrderPaid published");
            }
            Err(e) => {
                // The order stays PAID; downstream never hears about it
                // until the event is replayed by hand.
                self.metrics.record_publish(&self.order_paid_topic, false);
                tracing::error!(
                    order_id = %stored.id,
                    transaction_id = %transaction_id,
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to publish OrderPaid"
                );
            }
        }

        Ok(transaction_id)
    }

    async fn record_payment(
        &self,
        order: &Order,
        transaction_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Order, ServiceError> {
        let order_id = order.id;
        let cancel = CancellationToken::new();

        let outcome = retry_with_backoff(&self.paid_write_retry, &cancel, |attempt| async move {
            let mut current = if attempt == 1 {
                order.clone()
            } else {
                match self.repository.get(order_id).await {
                    Ok(fresh) => fresh,
                    Err(e) => return Ok(Err(ServiceError::from(e))),
                }
            };

            if current.mark_paid(transaction_id, method).is_err() {
                tracing::warn!(order_id = %order_id, status = %current.status, "Order moved on while being paid");
                return Ok(Err(ServiceError::Conflict(order_id)));
            }

            match self.repository.update(&current).await {
                Ok(stored) => Ok(Ok(stored)),
                Err(conflict @ StoreError::Conflict { .. }) => Err(conflict),
                Err(e) => Ok(Err(ServiceError::from(e))),
            }
        })
        .await;

        match outcome {
            RetryResult::Success(result) => result.map_err(|e| self.internal("pay_order", e)),
            RetryResult::Failed(_) | RetryResult::Cancelled => Err(ServiceError::Conflict(order_id)),
        }
    }

    // ------------------------------------------------------------------------
    // CancelOrder
    // ------------------------------------------------------------------------

    pub async fn cancel_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let mut order = self.load(order_id, "cancel_order").await?;

        if let Err(e) = order.cancel() {
            tracing::warn!(order_id = %order_id, status = %order.status, "Order cannot be cancelled");
            return Err(e.into());
        }

        self.repository
            .update(&order)
            .await
            .map_err(|e| self.internal("cancel_order", e.into()))?;

        self.metrics
            .record_transition(OrderStatus::PendingPayment.as_str(), OrderStatus::Cancelled.as_str());
        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // OnShipAssembled
    // ------------------------------------------------------------------------

    /// Apply an assembly signal. Only PAID orders move to ASSEMBLED; a
    /// redelivered signal is a no-op and any other status is left untouched.
    /// Returns `None` when the order does not exist.
    pub async fn on_ship_assembled(
        &self,
        event: &ShipAssembledEvent,
    ) -> Result<Option<AssemblyOutcome>, ServiceError> {
        let mut order = match self.repository.get(event.order_id).await {
            Ok(order) => order,
            Err(StoreError::NotFound(_)) => {
                self.metrics.record_assembly_signal("missing");
                tracing::warn!(
                    order_id = %event.order_id,
                    event_id = %event.event_id,
                    "ShipAssembled for unknown order, dropping"
                );
                return Ok(None);
            }
            Err(e) => return Err(self.internal("on_ship_assembled", e.into())),
        };

        let outcome = order.mark_assembled();
        match outcome {
            AssemblyOutcome::Assembled => {
                self.repository
                    .update(&order)
                    .await
                    .map_err(|e| self.internal("on_ship_assembled", e.into()))?;
                self.metrics.record_assembly_signal("assembled");
                self.metrics
                    .record_transition(OrderStatus::Paid.as_str(), OrderStatus::Assembled.as_str());
                tracing::info!(
                    order_id = %order.id,
                    build_time_secs = event.build_time_secs,
                    "Order assembled"
                );
            }
            AssemblyOutcome::Duplicate => {
                self.metrics.record_assembly_signal("duplicate");
                tracing::info!(order_id = %order.id, event_id = %event.event_id, "Order already assembled, ignoring redelivery");
            }
            AssemblyOutcome::Rejected { status } => {
                self.metrics.record_assembly_signal("rejected");
                tracing::warn!(
                    order_id = %order.id,
                    event_id = %event.event_id,
                    status = %status,
                    "ShipAssembled for order that is not PAID, status left unchanged"
                );
            }
        }

        Ok(Some(outcome))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
