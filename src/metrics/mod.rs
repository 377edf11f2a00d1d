mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};

use crate::utils::CircuitState;

pub use server::{spawn_metrics_server, start_metrics_server};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// One registry per process. Covers:
// - Order lifecycle (creations, payments, state transitions)
// - Assembly signals applied/ignored by the order service
// - Bus traffic (published and consumed events, handler latency)
// - Notifications delivered to the chat endpoint
// - Circuit breaker and component health gauges
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order lifecycle
    pub orders_created: IntCounter,
    pub payments: IntCounterVec,
    pub order_transitions: IntCounterVec,
    pub assembly_signals: IntCounterVec,

    // Bus
    pub events_published: IntCounterVec,
    pub events_consumed: IntCounterVec,
    pub handler_duration: HistogramVec,

    // Notifications
    pub notifications_sent: IntCounterVec,

    // Resilience / health
    pub circuit_breaker_state: IntGaugeVec,
    pub component_health: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let payments = IntCounterVec::new(
            Opts::new("order_payments_total", "Payment attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payments.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Persisted order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let assembly_signals = IntCounterVec::new(
            Opts::new("assembly_signals_total", "Ship-assembled signals by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(assembly_signals.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Events published to the bus"),
            &["topic", "outcome"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let events_consumed = IntCounterVec::new(
            Opts::new("events_consumed_total", "Event handling attempts"),
            &["topic", "outcome"],
        )?;
        registry.register(Box::new(events_consumed.clone()))?;

        let handler_duration = HistogramVec::new(
            HistogramOpts::new("event_handler_duration_seconds", "Event handler duration")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
            &["topic"],
        )?;
        registry.register(Box::new(handler_duration.clone()))?;

        let notifications_sent = IntCounterVec::new(
            Opts::new("notifications_sent_total", "Chat notifications by kind and outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(notifications_sent.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "component_health_status",
                "Component health (0=Unhealthy, 1=Degraded, 2=Healthy)",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            payments,
            order_transitions,
            assembly_signals,
            events_published,
            events_consumed,
            handler_duration,
            notifications_sent,
            circuit_breaker_state,
            component_health,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    /// `outcome` is one of `paid`, `failed`, `invalid_status`, `conflict`.
    pub fn record_payment(&self, outcome: &str) {
        self.payments.with_label_values(&[outcome]).inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_assembly_signal(&self, outcome: &str) {
        self.assembly_signals.with_label_values(&[outcome]).inc();
    }

    pub fn record_publish(&self, topic: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.events_published.with_label_values(&[topic, outcome]).inc();
    }

    pub fn record_consumed(&self, topic: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.events_consumed.with_label_values(&[topic, outcome]).inc();
        self.handler_duration.with_label_values(&[topic]).observe(duration_secs);
    }

    pub fn record_notification(&self, kind: &str, success: bool) {
        let outcome = if success { "sent" } else { "failed" };
        self.notifications_sent.with_label_values(&[kind, outcome]).inc();
    }

    pub fn set_circuit_state(&self, breaker: &str, state: CircuitState) {
        let value = match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        };
        self.circuit_breaker_state.with_label_values(&[breaker]).set(value);
    }

    pub fn set_component_health(&self, component: &str, value: i64) {
        self.component_health.with_label_values(&[component]).set(value);
    }
}
