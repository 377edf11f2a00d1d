// ============================================================================
// Actors Module
// ============================================================================
//
// Actors are reserved for infrastructure concerns. Order state lives in the
// store and is driven by OrderService, not by an actor per order.
//
// Structure:
// - core/           - health types shared by reporters and the monitor
// - infrastructure/ - HealthMonitorActor
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthStatus};
pub use self::infrastructure::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
