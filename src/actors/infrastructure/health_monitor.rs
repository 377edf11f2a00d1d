use chrono::{DateTime, Utc};
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::{Actor, Reply};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::CircuitBreaker;

// ============================================================================
// Health Monitor Actor - aggregates component health for /health
// ============================================================================
//
// Components push their status with `UpdateHealth` (consumers, store).
// Circuit breakers handed over at construction are polled periodically and
// reported under their breaker name.
//
// ============================================================================

const BREAKER_POLL_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Messages
// ============================================================================

pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

impl UpdateHealth {
    pub fn new(component: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            component: component.into(),
            status,
            details: None,
        }
    }
}

pub struct GetSystemHealth;

#[derive(Debug, Clone, Serialize, Reply)]
pub struct SystemHealth {
    pub service: &'static str,
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    service: &'static str,
    components: BTreeMap<String, ComponentHealth>,
    breakers: Vec<CircuitBreaker>,
    metrics: Arc<Metrics>,
}

impl HealthMonitorActor {
    pub fn new(service: &'static str, metrics: Arc<Metrics>) -> Self {
        Self {
            service,
            components: BTreeMap::new(),
            breakers: Vec::new(),
            metrics,
        }
    }

    pub fn watch_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breakers.push(breaker);
        self
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut degraded = false;
        let mut unhealthy = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(reason) => unhealthy.push(format!("{}: {}", name, reason)),
                HealthStatus::Degraded(_) => degraded = true,
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy.is_empty() {
            HealthStatus::Unhealthy(unhealthy.join(", "))
        } else if degraded {
            HealthStatus::Degraded("some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!(service = state.service, "HealthMonitorActor started");

        if !state.breakers.is_empty() {
            let breakers = state.breakers.clone();
            let metrics = state.metrics.clone();
            let monitor = actor_ref.downgrade();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(BREAKER_POLL_INTERVAL);
                loop {
                    interval.tick().await;
                    let Some(monitor) = monitor.upgrade() else {
                        break;
                    };

                    for breaker in &breakers {
                        let state = breaker.get_state().await;
                        metrics.set_circuit_state(breaker.name(), state);
                        let _ = monitor
                            .tell(UpdateHealth::new(breaker.name(), HealthStatus::from(state)))
                            .await;
                    }
                }
            });
        }

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if let Some(previous) = self.components.get(&msg.component) {
            if previous.status != msg.status {
                tracing::info!(
                    component = %msg.component,
                    from = ?previous.status,
                    to = ?msg.status,
                    "Component health changed"
                );
            }
        }

        self.metrics
            .set_component_health(&msg.component, msg.status.gauge_value());

        let mut health = ComponentHealth::new(msg.component.clone(), msg.status);
        if let Some(details) = msg.details {
            health = health.with_details(details);
        }
        self.components.insert(msg.component, health);
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        SystemHealth {
            service: self.service,
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}
