// ============================================================================
// Infrastructure Actors
// ============================================================================

mod health_monitor;

pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
