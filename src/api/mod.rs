use actix_web::dev::Server;
use actix_web::http::{header, StatusCode};
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{Order, OrderService, OrderStatus, PaymentMethod, ServiceError};

// ============================================================================
// Order HTTP API
// ============================================================================
//
//   POST /api/v1/orders                      create
//   GET  /api/v1/orders?limit=&offset=       list
//   GET  /api/v1/orders/{order_uuid}         get
//   POST /api/v1/orders/{order_uuid}/pay     pay
//   POST /api/v1/orders/{order_uuid}/cancel  cancel
//
// Errors are `{ "error": <code>, "message": <text> }`. Internal failures are
// logged by the service and reported without detail.
//
// ============================================================================

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_uuid: Uuid,
    pub part_uuids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_uuid: Uuid,
    pub total_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct PayOrderRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayOrderResponse {
    pub transaction_uuid: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderView {
    pub order_uuid: Uuid,
    pub user_uuid: Uuid,
    pub part_uuids: Vec<Uuid>,
    pub total_price: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_uuid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payment_method: Option<PaymentMethod>,
    pub status: OrderStatus,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_uuid: order.id,
            user_uuid: order.user_id,
            part_uuids: order.part_ids().to_vec(),
            total_price: order.total_price(),
            transaction_uuid: order.transaction_id,
            payment_method: order.payment_method,
            status: order.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid order uuid: {0}")]
    InvalidUuid(String),

    #[error("{0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Service(e) => e.code(),
            ApiError::InvalidUuid(_) => "invalid_uuid",
            ApiError::InvalidRequest(_) => "invalid_request",
        }
    }
}

const CONFLICT_RETRY_AFTER_SECS: u64 = 1;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::PartNotFound(_) | ServiceError::EmptyParts => StatusCode::BAD_REQUEST,
                ServiceError::InvalidStatus { .. }
                | ServiceError::Conflict(_)
                | ServiceError::OrderAlreadyExists(_) => StatusCode::CONFLICT,
                ServiceError::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidUuid(_) | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Service(ServiceError::Internal(_)) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, ApiError::Service(e) if e.is_retryable()) {
            response.insert_header((header::RETRY_AFTER, CONFLICT_RETRY_AFTER_SECS));
        }
        response.json(ErrorBody {
            error: self.code().to_string(),
            message,
        })
    }
}

fn parse_order_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidUuid(raw.to_string()))
}

async fn create_order(
    service: web::Data<OrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let order = service.create_order(request.user_uuid, request.part_uuids).await?;

    Ok(HttpResponse::Ok().json(CreateOrderResponse {
        order_uuid: order.id,
        total_price: order.total_price(),
    }))
}

async fn get_order(service: web::Data<OrderService>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let order_id = parse_order_id(&path)?;
    let order = service.get_order(order_id).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(&order)))
}

async fn list_orders(service: web::Data<OrderService>, query: web::Query<ListQuery>) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let orders = service.list_orders(limit, offset).await?;
    let views: Vec<OrderView> = orders.iter().map(OrderView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn pay_order(
    service: web::Data<OrderService>,
    path: web::Path<String>,
    body: web::Json<PayOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let order_id = parse_order_id(&path)?;
    let transaction_uuid = service.pay_order(order_id, body.payment_method).await?;
    Ok(HttpResponse::Ok().json(PayOrderResponse { transaction_uuid }))
}

async fn cancel_order(service: web::Data<OrderService>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let order_id = parse_order_id(&path)?;
    service.cancel_order(order_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Register the order routes. The app must carry `web::Data<OrderService>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::InvalidRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::InvalidRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1/orders")
            .route("", web::post().to(create_order))
            .route("", web::get().to(list_orders))
            .route("/{order_uuid}", web::get().to(get_order))
            .route("/{order_uuid}/pay", web::post().to(pay_order))
            .route("/{order_uuid}/cancel", web::post().to(cancel_order)),
    );
}

/// Bind the order API. The returned server must be awaited (or spawned).
pub fn http_server(service: Arc<OrderService>, host: &str, port: u16) -> std::io::Result<Server> {
    tracing::info!("Starting order API on http://{}:{}/api/v1/orders", host, port);

    let data = web::Data::from(service);
    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .disable_signals()
        .run();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, InventoryClient, PaymentClient};
    use crate::domain::order::Part;
    use crate::messaging::testing::RecordingPublisher;
    use crate::messaging::ORDER_PAID_TOPIC;
    use crate::metrics::Metrics;
    use crate::store::InMemoryOrderRepository;
    use actix_web::test;
    use async_trait::async_trait;
    use serde_json::json;

    struct Catalog(Vec<Uuid>);

    #[async_trait]
    impl InventoryClient for Catalog {
        async fn get_part(&self, part_id: Uuid) -> Result<Part, ClientError> {
            if self.0.contains(&part_id) {
                Ok(Part {
                    id: part_id,
                    name: "hull".to_string(),
                    price: 10.0,
                })
            } else {
                Err(ClientError::NotFound(part_id.to_string()))
            }
        }
    }

    struct Processor(Uuid);

    #[async_trait]
    impl PaymentClient for Processor {
        async fn pay(&self, _: Uuid, _: Uuid, method: PaymentMethod) -> Result<Uuid, ClientError> {
            match method {
                PaymentMethod::Unknown => Err(ClientError::Rejected("unsupported payment method".to_string())),
                _ => Ok(self.0),
            }
        }
    }

    struct Fixture {
        service: Arc<OrderService>,
        publisher: Arc<RecordingPublisher>,
        part: Uuid,
        transaction: Uuid,
    }

    fn fixture() -> Fixture {
        let part = Uuid::new_v4();
        let transaction = Uuid::new_v4();
        let publisher = Arc::new(RecordingPublisher::new());
        let service = OrderService::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(Catalog(vec![part])),
            Arc::new(Processor(transaction)),
            publisher.clone(),
            Arc::new(Metrics::new().unwrap()),
        );
        Fixture {
            service: Arc::new(service),
            publisher,
            part,
            transaction,
        }
    }

    macro_rules! app {
        ($service:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from($service.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    async fn create(fx: &Fixture) -> Uuid {
        fx.service
            .create_order(Uuid::new_v4(), vec![fx.part, fx.part])
            .await
            .unwrap()
            .id
    }

    #[actix_web::test]
    async fn test_create_order() {
        let fx = fixture();
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .set_json(json!({ "user_uuid": Uuid::new_v4(), "part_uuids": [fx.part, fx.part] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: CreateOrderResponse = test::read_body_json(resp).await;
        assert_eq!(body.total_price, 0.0);

        let order = fx.service.get_order(body.order_uuid).await.unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.part_ids().len(), 2);
    }

    #[actix_web::test]
    async fn test_create_with_unknown_part() {
        let fx = fixture();
        let app = app!(fx.service);
        let unknown = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .set_json(json!({ "user_uuid": Uuid::new_v4(), "part_uuids": [fx.part, unknown] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "part_not_found");
        assert!(body.message.contains(&unknown.to_string()));
    }

    #[actix_web::test]
    async fn test_create_with_empty_parts() {
        let fx = fixture();
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .set_json(json!({ "user_uuid": Uuid::new_v4(), "part_uuids": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "empty_parts");
    }

    #[actix_web::test]
    async fn test_malformed_body_rejected() {
        let fx = fixture();
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .set_json(json!({ "user_uuid": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_request");
    }

    #[actix_web::test]
    async fn test_get_order_view() {
        let fx = fixture();
        let order_id = create(&fx).await;
        fx.service.pay_order(order_id, PaymentMethod::Card).await.unwrap();
        let app = app!(fx.service);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{order_id}"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["order_uuid"], json!(order_id));
        assert_eq!(body["status"], "PAID");
        assert_eq!(body["payment_method"], "CARD");
        assert_eq!(body["transaction_uuid"], json!(fx.transaction));
        assert_eq!(body["part_uuids"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_get_unpaid_order_omits_payment() {
        let fx = fixture();
        let order_id = create(&fx).await;
        let app = app!(fx.service);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{order_id}"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "PENDING_PAYMENT");
        assert!(body.get("transaction_uuid").is_none());
        assert!(body.get("payment_method").is_none());
    }

    #[actix_web::test]
    async fn test_get_missing_order() {
        let fx = fixture();
        let app = app!(fx.service);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "order_not_found");
    }

    #[actix_web::test]
    async fn test_invalid_uuid_in_path() {
        let fx = fixture();
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri("/api/v1/orders/not-a-uuid/cancel")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_uuid");
    }

    #[actix_web::test]
    async fn test_pay_order_then_pay_again() {
        let fx = fixture();
        let order_id = create(&fx).await;
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/pay"))
            .set_json(json!({ "payment_method": "SBP" }))
            .to_request();
        let body: PayOrderResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.transaction_uuid, fx.transaction);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/pay"))
            .set_json(json!({ "payment_method": "SBP" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_status");

        assert_eq!(fx.publisher.records().len(), 1);
        assert_eq!(fx.publisher.records()[0].topic, ORDER_PAID_TOPIC);
    }

    #[actix_web::test]
    async fn test_payment_rejected() {
        let fx = fixture();
        let order_id = create(&fx).await;
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/pay"))
            .set_json(json!({ "payment_method": "UNKNOWN" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "payment_failed");
        assert_eq!(
            fx.service.get_order(order_id).await.unwrap().status,
            OrderStatus::PendingPayment
        );
    }

    #[actix_web::test]
    async fn test_cancel_order() {
        let fx = fixture();
        let order_id = create(&fx).await;
        let app = app!(fx.service);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/cancel"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{order_id}/cancel"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_list_orders_paginates() {
        let fx = fixture();
        for _ in 0..3 {
            create(&fx).await;
        }
        let app = app!(fx.service);

        let req = test::TestRequest::get()
            .uri("/api/v1/orders?limit=2&offset=0")
            .to_request();
        let first: Vec<OrderView> = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/orders?limit=2&offset=2")
            .to_request();
        let second: Vec<OrderView> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
    }

    #[actix_web::test]
    async fn test_conflict_carries_retry_after() {
        let conflict = ApiError::Service(ServiceError::Conflict(Uuid::new_v4())).error_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            conflict.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("1")
        );

        let wrong_state = ApiError::Service(ServiceError::InvalidStatus {
            current: OrderStatus::Paid,
            expected: OrderStatus::PendingPayment,
        })
        .error_response();
        assert_eq!(wrong_state.status(), StatusCode::CONFLICT);
        assert!(wrong_state.headers().get(header::RETRY_AFTER).is_none());
    }
}
