use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::Order;
use super::{OrderRepository, StoreError};

/// Process-local store used for development runs and tests.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    writes: AtomicUsize,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes (create + update).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists(order.id));
        }
        orders.insert(order.id, order.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&order.id).ok_or(StoreError::NotFound(order.id))?;

        if stored.version != order.version {
            return Err(StoreError::Conflict {
                id: order.id,
                expected: order.version,
            });
        }

        let mut next = order.clone();
        next.version += 1;
        *stored = next.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}
