// ============================================================================
// Order Store - durable keyed record of orders
// ============================================================================
//
// Owned exclusively by the order service. `update` is conditional on the
// order's `version`: it succeeds only if the stored version equals the one
// the caller read, and bumps it by one.
//
// ============================================================================

mod memory;
mod scylla;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::Order;

pub use self::memory::InMemoryOrderRepository;
pub use self::scylla::ScyllaOrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} already exists")]
    AlreadyExists(Uuid),

    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {id} version conflict: expected {expected}")]
    Conflict { id: Uuid, expected: i64 },

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Order, StoreError>;

    /// Persist `order` if the stored version still equals `order.version`.
    /// Returns the order as stored, with its new version.
    async fn update(&self, order: &Order) -> Result<Order, StoreError>;

    /// Newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Order>, StoreError>;
}

/// Drop the last handle to a store so its connections close. Fails while
/// other components still hold it.
pub fn release_store<T: ?Sized>(store: Arc<T>) -> anyhow::Result<()> {
    let others = Arc::strong_count(&store) - 1;
    if others > 0 {
        anyhow::bail!("order store still held by {} other owner(s)", others);
    }
    drop(store);
    Ok(())
}
