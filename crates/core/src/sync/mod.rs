//! Local/remote synchronization: ports, schema adapter, reconciler, health.

pub mod health;
pub mod ports;
pub mod reconciler;
pub mod schema;
