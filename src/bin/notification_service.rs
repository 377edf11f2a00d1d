use kameo::Actor;
use std::sync::Arc;

use order_choreography::actors::HealthMonitorActor;
use order_choreography::config::{self, NotificationServiceConfig};
use order_choreography::messaging::{ConsumerConfig, MessageHandler, RedpandaConsumer};
use order_choreography::metrics::{spawn_metrics_server, Metrics};
use order_choreography::notification::{
    NotificationDispatcher, OrderPaidNotifier, ShipAssembledNotifier, TelegramClient, TelegramConfig,
};
use order_choreography::shutdown::{wait_for_signal, ShutdownCoordinator};
use order_choreography::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    telemetry::init_tracing();

    let config = NotificationServiceConfig::from_env()?;
    tracing::info!(
        brokers = %config.common.kafka_brokers,
        chat_id = config.telegram_chat_id,
        "Starting notification service"
    );

    let metrics = Arc::new(Metrics::new()?);
    let mut shutdown = ShutdownCoordinator::new(config.common.shutdown_grace);

    let health = HealthMonitorActor::spawn(HealthMonitorActor::new("notification-service", metrics.clone()));
    spawn_metrics_server(metrics.clone(), health.clone(), config.common.metrics_port);

    let telegram = TelegramClient::new(
        TelegramConfig::new(config.telegram_token.clone())
            .with_api_url(config.telegram_api_url.clone())
            .with_timeout(config.telegram_timeout),
    )?;
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(telegram),
        config.telegram_chat_id,
        metrics.clone(),
    ));

    let subscriptions: [(&'static str, String, Arc<dyn MessageHandler>); 2] = [
        (
            "order-paid-consumer",
            config.common.order_paid_topic.clone(),
            Arc::new(OrderPaidNotifier(dispatcher.clone())),
        ),
        (
            "ship-assembled-consumer",
            config.common.ship_assembled_topic.clone(),
            Arc::new(ShipAssembledNotifier(dispatcher)),
        ),
    ];

    for (name, topic, handler) in subscriptions {
        let consumer = RedpandaConsumer::new(ConsumerConfig {
            brokers: config.common.kafka_brokers.clone(),
            group_id: config.consumer_group.clone(),
            topic,
        })?;
        let task = tokio::spawn(consumer.run(handler, metrics.clone(), Some(health.clone()), shutdown.token()));
        shutdown.register(name, move || async move { task.await? });
    }

    wait_for_signal().await?;

    if let Err(e) = shutdown.close_all().await {
        tracing::error!(error = %e, "Forcing exit");
        std::process::exit(1);
    }
    Ok(())
}
