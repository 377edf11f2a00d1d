use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use kameo::actor::ActorRef;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use super::Metrics;
use crate::actors::{GetSystemHealth, HealthMonitorActor};

struct ServerState {
    metrics: Arc<Metrics>,
    health: ActorRef<HealthMonitorActor>,
}

/// Serve `/metrics` and `/health` until the server is stopped.
pub async fn start_metrics_server(
    metrics: Arc<Metrics>,
    health: ActorRef<HealthMonitorActor>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("Starting metrics server on http://0.0.0.0:{}/metrics", port);

    let state = web::Data::new(ServerState { metrics, health });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .disable_signals()
    .run()
    .await
}

/// Run the metrics server on its own thread and runtime so it keeps
/// answering while the service runtime is busy or shutting down.
pub fn spawn_metrics_server(metrics: Arc<Metrics>, health: ActorRef<HealthMonitorActor>, port: u16) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build metrics server runtime");
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = start_metrics_server(metrics, health, port).await {
                tracing::error!(error = %e, "Metrics server error");
            }
        });
    });
}

async fn metrics_handler(state: web::Data<ServerState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(state: web::Data<ServerState>) -> impl Responder {
    match state.health.ask(GetSystemHealth).await {
        Ok(health) if health.overall_status.is_unhealthy() => {
            HttpResponse::ServiceUnavailable().json(health)
        }
        Ok(health) => HttpResponse::Ok().json(health),
        Err(e) => {
            tracing::error!(error = %e, "Health monitor unavailable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "overall_status": { "status": "unhealthy", "reason": "health monitor unavailable" }
            }))
        }
    }
}
