//! Fulfillment worker for the flash-sale pipeline.
//!
//! Consumes admitted orders from the queue one at a time per partition,
//! reserves inventory through the store's atomic scripts, runs the
//! settlement step, and compensates with an atomic refund when settlement
//! fails after a reservation. Every failure path ends in either a terminal
//! status write or a dead-letter record - never silence.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod processor;
pub mod runner;
pub mod settlement;

pub use config::Config;
pub use processor::{OrderProcessor, ProcessOutcome};
pub use runner::Worker;
pub use settlement::{SettlementError, SettlementGateway, SimulatedSettlement};
