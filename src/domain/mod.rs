// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order lifecycle rules and the service that drives them. Infrastructure
// (store, bus, upstream clients) is reached only through traits.
//
// ============================================================================

pub mod order;
