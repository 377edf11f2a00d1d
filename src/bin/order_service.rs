use kameo::Actor;
use std::sync::Arc;
use std::time::Duration;

use order_choreography::actors::{HealthMonitorActor, HealthStatus, UpdateHealth};
use order_choreography::api;
use order_choreography::client::grpc::{InventoryGrpcClient, PaymentGrpcClient};
use order_choreography::config::{self, OrderServiceConfig, StoreBackend};
use order_choreography::domain::order::{OrderService, ShipAssembledHandler};
use order_choreography::messaging::{ConsumerConfig, RedpandaConsumer, RedpandaPublisher};
use order_choreography::metrics::{spawn_metrics_server, Metrics};
use order_choreography::shutdown::{wait_for_signal, ShutdownCoordinator};
use order_choreography::store::{release_store, InMemoryOrderRepository, OrderRepository, ScyllaOrderRepository};
use order_choreography::telemetry;

const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    telemetry::init_tracing();

    let config = OrderServiceConfig::from_env()?;
    tracing::info!(store = ?config.store, brokers = %config.common.kafka_brokers, "Starting order service");

    let metrics = Arc::new(Metrics::new()?);
    let mut shutdown = ShutdownCoordinator::new(config.common.shutdown_grace);

    // === 1. Order store ===
    let repository: Arc<dyn OrderRepository> = match config.store {
        StoreBackend::Scylla => Arc::new(
            ScyllaOrderRepository::connect(&config.scylla_nodes, &config.scylla_keyspace).await?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory order store, orders are lost on restart");
            Arc::new(InMemoryOrderRepository::new())
        }
    };
    {
        let repository = repository.clone();
        shutdown.register("order-store", move || async move { release_store(repository) });
    }

    // === 2. Upstream clients and bus producer ===
    let inventory = Arc::new(InventoryGrpcClient::connect_lazy(
        &config.inventory_addr,
        config.upstream_timeout,
    )?);
    let payment = Arc::new(PaymentGrpcClient::connect_lazy(
        &config.payment_addr,
        config.upstream_timeout,
    )?);
    let publisher = Arc::new(RedpandaPublisher::new(&config.common.kafka_brokers)?);

    {
        let publisher = publisher.clone();
        shutdown.register("redpanda-producer", move || async move {
            tokio::task::spawn_blocking(move || publisher.flush(PRODUCER_FLUSH_TIMEOUT)).await?
        });
    }

    // === 3. Health and metrics ===
    let health = HealthMonitorActor::spawn(
        HealthMonitorActor::new("order-service", metrics.clone())
            .watch_breaker(publisher.circuit_breaker())
            .watch_breaker(inventory.circuit_breaker())
            .watch_breaker(payment.circuit_breaker()),
    );
    let store_component = format!("store:{:?}", config.store).to_lowercase();
    if let Err(e) = health.tell(UpdateHealth::new(store_component, HealthStatus::Healthy)).await {
        tracing::warn!(error = %e, "Health monitor unavailable");
    }
    spawn_metrics_server(metrics.clone(), health.clone(), config.common.metrics_port);

    // === 4. Lifecycle manager ===
    let service = Arc::new(
        OrderService::new(repository, inventory, payment, publisher, metrics.clone())
            .with_order_paid_topic(config.common.order_paid_topic.clone()),
    );

    // === 5. ship.assembled consumer ===
    let consumer = RedpandaConsumer::new(ConsumerConfig {
        brokers: config.common.kafka_brokers.clone(),
        group_id: config.consumer_group.clone(),
        topic: config.common.ship_assembled_topic.clone(),
    })?;
    let consumer_task = tokio::spawn(consumer.run(
        Arc::new(ShipAssembledHandler::new(service.clone())),
        metrics.clone(),
        Some(health.clone()),
        shutdown.token(),
    ));
    shutdown.register("ship-assembled-consumer", move || async move { consumer_task.await? });

    // === 6. HTTP API ===
    let server = api::http_server(service, &config.http_host, config.http_port)?;
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);
    shutdown.register("http-api", move || async move {
        server_handle.stop(true).await;
        server_task.await??;
        Ok(())
    });

    wait_for_signal().await?;

    if let Err(e) = shutdown.close_all().await {
        tracing::error!(error = %e, "Forcing exit");
        std::process::exit(1);
    }
    Ok(())
}
