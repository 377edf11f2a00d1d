// ============================================================================
// Order Domain - the order lifecycle
// ============================================================================
//
// - Value objects (OrderStatus, PaymentMethod, Part)
// - Aggregate (Order with its transition rules)
// - Integration events (OrderPaid, ShipAssembled)
// - Errors (OrderError rules, ServiceError taxonomy)
// - OrderService (the lifecycle manager) and its ship.assembled handler
//
// ============================================================================

pub mod aggregate;
pub mod consumer;
pub mod errors;
pub mod events;
pub mod service;
pub mod value_objects;

pub use aggregate::*;
pub use consumer::ShipAssembledHandler;
pub use errors::*;
pub use events::*;
pub use service::OrderService;
pub use value_objects::*;
