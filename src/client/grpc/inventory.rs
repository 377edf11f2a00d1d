use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use super::proto::inventory::{GetPartRequest, GetPartResponse, GET_PART_PATH};
use super::UnaryCaller;
use crate::client::{ClientError, InventoryClient};
use crate::domain::order::Part;
use crate::utils::CircuitBreaker;

pub struct InventoryGrpcClient {
    caller: UnaryCaller,
}

impl InventoryGrpcClient {
    pub fn connect_lazy(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        tracing::info!(addr = %addr, "Inventory client configured");
        Ok(Self {
            caller: UnaryCaller::connect_lazy("inventory", addr, timeout)?,
        })
    }

    /// Shared handle for health reporting.
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.caller.circuit_breaker()
    }
}

fn part_from_response(part_id: Uuid, response: GetPartResponse) -> Result<Part, ClientError> {
    let part = response
        .part
        .ok_or_else(|| ClientError::NotFound(format!("part {}", part_id)))?;

    let id = Uuid::parse_str(&part.uuid)
        .map_err(|e| ClientError::Transport(format!("inventory returned invalid part uuid: {}", e)))?;

    Ok(Part {
        id,
        name: part.name,
        price: part.price,
    })
}

#[async_trait]
impl InventoryClient for InventoryGrpcClient {
    async fn get_part(&self, part_id: Uuid) -> Result<Part, ClientError> {
        let request = GetPartRequest {
            uuid: part_id.to_string(),
        };

        let response: GetPartResponse = self.caller.call(GET_PART_PATH, request).await?;
        part_from_response(part_id, response)
    }
}

#[cfg(test)]
mod tests {
    use super::super::proto::inventory::Part as WirePart;
    use super::*;

    #[test]
    fn test_missing_part_is_not_found() {
        let err = part_from_response(Uuid::new_v4(), GetPartResponse { part: None }).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn test_part_converted() {
        let id = Uuid::new_v4();
        let response = GetPartResponse {
            part: Some(WirePart {
                uuid: id.to_string(),
                name: "Hull plate".to_string(),
                description: String::new(),
                price: 120.5,
                stock_quantity: 3,
            }),
        };

        let part = part_from_response(id, response).unwrap();
        assert_eq!(part.id, id);
        assert_eq!(part.name, "Hull plate");
        assert_eq!(part.price, 120.5);
    }

    #[tokio::test]
    async fn test_unreachable_inventory_fails() {
        let client =
            InventoryGrpcClient::connect_lazy("http://127.0.0.1:1", Duration::from_millis(300)).unwrap();

        let err = client.get_part(Uuid::new_v4()).await.unwrap_err();
        assert!(!matches!(err, ClientError::NotFound(_)));
    }
}
