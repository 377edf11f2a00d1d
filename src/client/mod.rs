// ============================================================================
// Upstream Clients - synchronous request/response collaborators
// ============================================================================
//
// Every call is bounded by a timeout. A timeout is reported like any other
// failure: nothing is assumed about whether the remote side acted.
//
// ============================================================================

pub mod grpc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Part, PaymentMethod};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn get_part(&self, part_id: Uuid) -> Result<Part, ClientError>;
}

#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Charge the order. Not idempotent: no deduplication key is sent.
    async fn pay(&self, order_id: Uuid, user_id: Uuid, method: PaymentMethod) -> Result<Uuid, ClientError>;
}
