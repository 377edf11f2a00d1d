use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus, PaymentMethod};
use super::{OrderRepository, StoreError};

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// Conditional writes use lightweight transactions:
// - create: INSERT ... IF NOT EXISTS
// - update: UPDATE ... IF version = ?
//
// A non-applied LWT returns `[applied] = false` followed by the current
// values of the conditioned columns, which tells a missing row (null
// version) apart from a stale one.
//
// ============================================================================

const SELECT_COLUMNS: &str = "order_uuid, user_uuid, part_uuids, status, transaction_uuid, \
                              payment_method, version, created_at, updated_at";

type OrderRow = (
    Uuid,
    Uuid,
    Option<Vec<Uuid>>,
    String,
    Option<Uuid>,
    Option<String>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
}

fn backend<E: Into<anyhow::Error>>(err: E) -> StoreError {
    StoreError::Backend(err.into())
}

/// A SELECT that does not come back as rows is a backend fault, never a
/// missing order.
fn select_rows<T, E: Into<anyhow::Error>>(rows: Result<T, E>) -> Result<T, StoreError> {
    rows.map_err(backend)
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, create the keyspace/table if needed and switch to the keyspace.
    pub async fn connect(nodes: &[String], keyspace: &str) -> anyhow::Result<Self> {
        tracing::info!(nodes = ?nodes, keyspace = %keyspace, "Connecting to ScyllaDB...");

        let session: Session = SessionBuilder::new().known_nodes(nodes).build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                (),
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;

        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    order_uuid uuid PRIMARY KEY,
                    user_uuid uuid,
                    part_uuids list<uuid>,
                    status text,
                    transaction_uuid uuid,
                    payment_method text,
                    version bigint,
                    created_at timestamp,
                    updated_at timestamp
                )",
                (),
            )
            .await?;

        Ok(Self::new(Arc::new(session)))
    }

    fn order_from_row(row: OrderRow) -> Result<Order, StoreError> {
        let (id, user_id, part_ids, status, transaction_id, payment_method, version, created_at, updated_at) =
            row;

        let status: OrderStatus = status
            .parse()
            .map_err(|e: String| backend(anyhow::anyhow!(e)))?;
        let payment_method = payment_method
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()
            .map_err(|e| backend(anyhow::anyhow!(e)))?;

        Ok(Order::restore(
            id,
            version,
            user_id,
            part_ids.unwrap_or_default(),
            status,
            transaction_id,
            payment_method,
            created_at,
            updated_at,
        ))
    }

    /// Reads `[applied]` and, when not applied, the current `version` column.
    fn lwt_outcome(row: &Row) -> Result<(bool, Option<i64>), StoreError> {
        let applied = match row.columns.first() {
            Some(Some(CqlValue::Boolean(applied))) => *applied,
            other => {
                return Err(backend(anyhow::anyhow!(
                    "unexpected LWT response, [applied] column was {:?}",
                    other
                )))
            }
        };

        let version = row.columns.iter().skip(1).find_map(|col| match col {
            Some(CqlValue::BigInt(v)) => Some(*v),
            _ => None,
        });

        Ok((applied, version))
    }

    fn first_lwt_row(result: QueryResult) -> Result<Row, StoreError> {
        let rows_result = result.into_rows_result().map_err(backend)?;
        rows_result
            .maybe_first_row::<Row>()
            .map_err(backend)?
            .ok_or_else(|| backend(anyhow::anyhow!("LWT returned no rows")))
    }
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "INSERT INTO orders (
                    order_uuid, user_uuid, part_uuids, status, transaction_uuid,
                    payment_method, version, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    order.id,
                    order.user_id,
                    order.part_ids().to_vec(),
                    order.status.as_str(),
                    order.transaction_id,
                    order.payment_method.map(|m| m.as_str()),
                    order.version,
                    order.created_at,
                    order.updated_at,
                ),
            )
            .await
            .map_err(backend)?;

        let row = Self::first_lwt_row(result)?;
        let (applied, _) = Self::lwt_outcome(&row)?;
        if !applied {
            return Err(StoreError::AlreadyExists(order.id));
        }

        tracing::debug!(order_id = %order.id, "Inserted order row");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM orders WHERE order_uuid = ?", SELECT_COLUMNS),
                (id,),
            )
            .await
            .map_err(backend)?;

        let rows_result = select_rows(result.into_rows_result())?;

        match rows_result.maybe_first_row::<OrderRow>().map_err(backend)? {
            Some(row) => Self::order_from_row(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let next_version = order.version + 1;
        let updated_at = Utc::now();

        let result = self
            .session
            .query_unpaged(
                "UPDATE orders
                 SET status = ?, transaction_uuid = ?, payment_method = ?, version = ?, updated_at = ?
                 WHERE order_uuid = ?
                 IF version = ?",
                (
                    order.status.as_str(),
                    order.transaction_id,
                    order.payment_method.map(|m| m.as_str()),
                    next_version,
                    updated_at,
                    order.id,
                    order.version,
                ),
            )
            .await
            .map_err(backend)?;

        let row = Self::first_lwt_row(result)?;
        match Self::lwt_outcome(&row)? {
            (true, _) => {
                let mut stored = order.clone();
                stored.version = next_version;
                stored.updated_at = updated_at;
                Ok(stored)
            }
            (false, None) => Err(StoreError::NotFound(order.id)),
            (false, Some(current)) => {
                tracing::warn!(
                    order_id = %order.id,
                    expected = order.version,
                    current = current,
                    "Optimistic concurrency conflict on order update"
                );
                Err(StoreError::Conflict {
                    id: order.id,
                    expected: order.version,
                })
            }
        }
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Order>, StoreError> {
        // No server-side OFFSET in CQL; the table is read and paged here.
        let result = self
            .session
            .query_unpaged(format!("SELECT {} FROM orders", SELECT_COLUMNS), ())
            .await
            .map_err(backend)?;

        let rows_result = select_rows(result.into_rows_result())?;

        let mut orders = Vec::new();
        for row in rows_result.rows::<OrderRow>().map_err(backend)? {
            orders.push(Self::order_from_row(row.map_err(backend)?)?);
        }

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }
}
