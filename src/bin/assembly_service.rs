use kameo::Actor;
use std::sync::Arc;
use std::time::Duration;

use order_choreography::actors::HealthMonitorActor;
use order_choreography::assembly::{AssemblyWorker, RandomBuildTimer};
use order_choreography::config::{self, AssemblyServiceConfig};
use order_choreography::messaging::{ConsumerConfig, RedpandaConsumer, RedpandaPublisher};
use order_choreography::metrics::{spawn_metrics_server, Metrics};
use order_choreography::shutdown::{wait_for_signal, ShutdownCoordinator};
use order_choreography::telemetry;

const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    telemetry::init_tracing();

    let config = AssemblyServiceConfig::from_env()?;
    tracing::info!(
        brokers = %config.common.kafka_brokers,
        min_build_secs = config.min_build_secs,
        max_build_secs = config.max_build_secs,
        "Starting assembly service"
    );

    let metrics = Arc::new(Metrics::new()?);
    let mut shutdown = ShutdownCoordinator::new(config.common.shutdown_grace);

    let publisher = Arc::new(RedpandaPublisher::new(&config.common.kafka_brokers)?);
    {
        let publisher = publisher.clone();
        shutdown.register("redpanda-producer", move || async move {
            tokio::task::spawn_blocking(move || publisher.flush(PRODUCER_FLUSH_TIMEOUT)).await?
        });
    }

    let health = HealthMonitorActor::spawn(
        HealthMonitorActor::new("assembly-service", metrics.clone())
            .watch_breaker(publisher.circuit_breaker()),
    );
    spawn_metrics_server(metrics.clone(), health.clone(), config.common.metrics_port);

    let worker = AssemblyWorker::new(
        publisher,
        Arc::new(RandomBuildTimer::new(config.min_build_secs, config.max_build_secs)),
        metrics.clone(),
    )
    .with_ship_assembled_topic(config.common.ship_assembled_topic.clone());

    let consumer = RedpandaConsumer::new(ConsumerConfig {
        brokers: config.common.kafka_brokers.clone(),
        group_id: config.consumer_group.clone(),
        topic: config.common.order_paid_topic.clone(),
    })?;
    let consumer_task = tokio::spawn(consumer.run(
        Arc::new(worker),
        metrics.clone(),
        Some(health.clone()),
        shutdown.token(),
    ));
    shutdown.register("order-paid-consumer", move || async move { consumer_task.await? });

    wait_for_signal().await?;

    if let Err(e) = shutdown.close_all().await {
        tracing::error!(error = %e, "Forcing exit");
        std::process::exit(1);
    }
    Ok(())
}
