// ============================================================================
// Order Choreography
// ============================================================================
//
// Three services sharing one library:
//
//   order-service         order lifecycle (HTTP API, store, upstream gRPC),
//                         publishes order.paid, consumes ship.assembled
//   assembly-service      consumes order.paid, publishes ship.assembled
//   notification-service  consumes both, sends Telegram messages
//
// ============================================================================

pub mod actors;
pub mod api;
pub mod assembly;
pub mod client;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod notification;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod utils;
