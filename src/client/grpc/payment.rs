use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use super::proto::payment::{self as wire, PayOrderRequest, PayOrderResponse, PAY_ORDER_PATH};
use super::UnaryCaller;
use crate::client::{ClientError, PaymentClient};
use crate::domain::order::PaymentMethod;
use crate::utils::CircuitBreaker;

pub struct PaymentGrpcClient {
    caller: UnaryCaller,
}

impl PaymentGrpcClient {
    pub fn connect_lazy(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        tracing::info!(addr = %addr, "Payment client configured");
        Ok(Self {
            caller: UnaryCaller::connect_lazy("payment", addr, timeout)?,
        })
    }

    /// Shared handle for health reporting.
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.caller.circuit_breaker()
    }
}

fn wire_method(method: PaymentMethod) -> wire::PaymentMethod {
    match method {
        PaymentMethod::Card => wire::PaymentMethod::Card,
        PaymentMethod::Sbp => wire::PaymentMethod::Sbp,
        PaymentMethod::CreditCard => wire::PaymentMethod::CreditCard,
        PaymentMethod::InvestorMoney => wire::PaymentMethod::InvestorMoney,
        PaymentMethod::Unknown => wire::PaymentMethod::Unknown,
    }
}

#[async_trait]
impl PaymentClient for PaymentGrpcClient {
    async fn pay(&self, order_id: Uuid, user_id: Uuid, method: PaymentMethod) -> Result<Uuid, ClientError> {
        let request = PayOrderRequest {
            order_uuid: order_id.to_string(),
            user_uuid: user_id.to_string(),
            payment_method: wire_method(method) as i32,
        };

        let response: PayOrderResponse = self.caller.call(PAY_ORDER_PATH, request).await?;

        Uuid::parse_str(&response.transaction_uuid).map_err(|e| {
            ClientError::Transport(format!("payment returned invalid transaction uuid: {}", e))
        })
    }
}
