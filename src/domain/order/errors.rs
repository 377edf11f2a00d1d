use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order parts cannot be empty")]
    EmptyParts,

    #[error("Invalid order status: expected {expected}, got {current}")]
    InvalidStatus {
        current: OrderStatus,
        expected: OrderStatus,
    },
}

// ============================================================================
// Service Errors - the taxonomy surfaced to API callers
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("part {0} not found")]
    PartNotFound(Uuid),

    #[error("order parts cannot be empty")]
    EmptyParts,

    #[error("invalid order status: expected {expected}, got {current}")]
    InvalidStatus {
        current: OrderStatus,
        expected: OrderStatus,
    },

    #[error("order {0} already exists")]
    OrderAlreadyExists(Uuid),

    #[error("order {0} was modified concurrently, retry from a fresh read")]
    Conflict(Uuid),

    #[error("payment processing failed: {0}")]
    PaymentFailed(String),

    #[error("internal service error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    /// Stable machine-readable code used in API error bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::OrderNotFound(_) => "order_not_found",
            ServiceError::PartNotFound(_) => "part_not_found",
            ServiceError::EmptyParts => "empty_parts",
            ServiceError::InvalidStatus { .. } => "invalid_status",
            ServiceError::OrderAlreadyExists(_) => "order_already_exists",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::PaymentFailed(_) => "payment_failed",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Client errors may be retried by the caller only for `Conflict`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyParts => ServiceError::EmptyParts,
            OrderError::InvalidStatus { current, expected } => {
                ServiceError::InvalidStatus { current, expected }
            }
        }
    }
}
