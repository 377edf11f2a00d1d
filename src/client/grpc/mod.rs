mod inventory;
mod payment;
pub mod proto;

use std::time::Duration;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Response, Status};

use super::ClientError;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

pub use inventory::InventoryGrpcClient;
pub use payment::PaymentGrpcClient;

// ============================================================================
// Unary gRPC caller shared by the upstream clients
// ============================================================================
//
// Only transport-level failures (timeouts, unavailable upstream) count
// against the circuit breaker. Application statuses such as NOT_FOUND are
// valid answers and pass through untouched.
//
// ============================================================================

pub(crate) struct UnaryCaller {
    service: &'static str,
    channel: Channel,
    timeout: Duration,
    circuit_breaker: CircuitBreaker,
}

impl UnaryCaller {
    pub fn connect_lazy(service: &'static str, addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        let endpoint = Endpoint::from_shared(addr.to_string())
            .map_err(|e| ClientError::Transport(format!("invalid {} address {}: {}", service, addr, e)))?
            .connect_timeout(timeout)
            .timeout(timeout);

        Ok(Self {
            service,
            channel: endpoint.connect_lazy(),
            timeout,
            circuit_breaker: CircuitBreaker::new(service, CircuitBreakerConfig::default()),
        })
    }

    pub async fn call<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, ClientError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = Grpc::new(self.channel.clone());
        let timeout = self.timeout;

        let outcome = self
            .circuit_breaker
            .call(async move {
                let call = async {
                    grpc.ready()
                        .await
                        .map_err(|e| ClientError::Unavailable(e.to_string()))?;
                    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
                    Ok::<Result<Response<Resp>, Status>, ClientError>(
                        grpc.unary(Request::new(request), PathAndQuery::from_static(path), codec)
                            .await,
                    )
                };

                match tokio::time::timeout(timeout, call).await {
                    Err(_) => Err(ClientError::Timeout(timeout)),
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(Err(status))) if is_transport_failure(&status) => Err(status_to_error(status)),
                    Ok(Ok(response)) => Ok(response),
                }
            })
            .await;

        match outcome {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(status_to_error(status)),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(service = self.service, "Circuit breaker open - upstream unavailable");
                Err(ClientError::Unavailable(format!("{} circuit breaker open", self.service)))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.circuit_breaker.clone()
    }
}

fn is_transport_failure(status: &Status) -> bool {
    matches!(status.code(), Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled)
}

pub(crate) fn status_to_error(status: Status) -> ClientError {
    match status.code() {
        Code::NotFound => ClientError::NotFound(status.message().to_string()),
        Code::InvalidArgument | Code::FailedPrecondition | Code::PermissionDenied | Code::Aborted => {
            ClientError::Rejected(status.message().to_string())
        }
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
            ClientError::Unavailable(status.message().to_string())
        }
        code => ClientError::Transport(format!("{:?}: {}", code, status.message())),
    }
}
