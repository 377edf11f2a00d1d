use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Key rules:
// 1. The part list is fixed at creation and never mutated
// 2. Status only moves along the edges of OrderStatus::can_transition_to
// 3. `version` is the optimistic concurrency token checked by the store
//
// ============================================================================

/// Price reported for an order. Totals are not computed from part prices.
pub const PLACEHOLDER_TOTAL_PRICE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Current State
    pub user_id: Uuid,
    part_ids: Vec<Uuid>,
    pub status: OrderStatus,
    pub transaction_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a "ship assembled" signal to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyOutcome {
    /// PAID -> ASSEMBLED was applied.
    Assembled,
    /// Already ASSEMBLED; redelivered signal, nothing to write.
    Duplicate,
    /// The order is not PAID and stays in `status`.
    Rejected { status: OrderStatus },
}

impl Order {
    /// Build a new order in `PENDING_PAYMENT`.
    pub fn new(id: Uuid, user_id: Uuid, part_ids: Vec<Uuid>) -> Result<Self, OrderError> {
        if part_ids.is_empty() {
            return Err(OrderError::EmptyParts);
        }

        let now = Utc::now();
        Ok(Self {
            id,
            version: 1,
            user_id,
            part_ids,
            status: OrderStatus::PendingPayment,
            transaction_id: None,
            payment_method: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrate a persisted order without re-running creation rules.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        version: i64,
        user_id: Uuid,
        part_ids: Vec<Uuid>,
        status: OrderStatus,
        transaction_id: Option<Uuid>,
        payment_method: Option<PaymentMethod>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version,
            user_id,
            part_ids,
            status,
            transaction_id,
            payment_method,
            created_at,
            updated_at,
        }
    }

    pub fn part_ids(&self) -> &[Uuid] {
        &self.part_ids
    }

    pub fn total_price(&self) -> f64 {
        PLACEHOLDER_TOTAL_PRICE
    }

    fn ensure_status(&self, expected: OrderStatus) -> Result<(), OrderError> {
        if self.status != expected {
            return Err(OrderError::InvalidStatus {
                current: self.status,
                expected,
            });
        }
        Ok(())
    }

    /// Precondition check for payment, run before the processor is called.
    pub fn ensure_payable(&self) -> Result<(), OrderError> {
        self.ensure_status(OrderStatus::PendingPayment)
    }

    /// PENDING_PAYMENT -> PAID
    pub fn mark_paid(
        &mut self,
        transaction_id: Uuid,
        method: PaymentMethod,
    ) -> Result<(), OrderError> {
        self.ensure_payable()?;
        self.status = OrderStatus::Paid;
        self.transaction_id = Some(transaction_id);
        self.payment_method = Some(method);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// PENDING_PAYMENT -> CANCELLED
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.ensure_status(OrderStatus::PendingPayment)?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// PAID -> ASSEMBLED, tolerating redelivery of the same signal.
    pub fn mark_assembled(&mut self) -> AssemblyOutcome {
        match self.status {
            OrderStatus::Paid => {
                self.status = OrderStatus::Assembled;
                self.updated_at = Utc::now();
                AssemblyOutcome::Assembled
            }
            OrderStatus::Assembled => AssemblyOutcome::Duplicate,
            status => AssemblyOutcome::Rejected { status },
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
