//! HTTP server for the gateway: routes, shared state, and handlers.

pub mod buy;
pub mod health;
pub mod metrics;
pub mod routes;

pub use routes::build_router;
