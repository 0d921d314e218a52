//! Ingress service for the flash-sale pipeline.
//!
//! Accepts purchase requests over HTTP, enforces per-user rate limits and
//! exactly-once admission per request id, and hands accepted orders to the
//! queue through a circuit breaker. Fulfillment happens asynchronously in
//! the worker; the gateway's contract ends at a committed enqueue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod config;
pub mod server;
pub mod state;

pub use admission::{admit, Admission};
pub use config::Config;
pub use state::AppState;
