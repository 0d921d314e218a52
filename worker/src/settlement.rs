//! The post-reservation settlement step.
//!
//! Settlement is the one pipeline stage that lives outside the store, which
//! is why reserve/settle/refund is a saga and not a transaction. The
//! production implementation simulates a flaky downstream processor with an
//! independent random draw per order; tests inject deterministic
//! implementations to force either branch.

use flashsale_core::OrderRequest;
use thiserror::Error;

/// Failure of the settlement step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// The downstream processor did not answer in time.
    #[error("settlement timed out")]
    Timeout,
}

/// The downstream settlement dependency.
pub trait SettlementGateway: Send + Sync {
    /// Attempt to settle one order.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError`] when settlement fails; the caller
    /// refunds the reservation and dead-letters the message.
    fn charge(&self, order: &OrderRequest) -> Result<(), SettlementError>;
}

/// Simulated settlement that fails a configurable fraction of orders.
///
/// Each message gets its own uniform draw, so failures are independent
/// across messages and workers rather than clustered on wall-clock seconds.
#[derive(Debug, Clone)]
pub struct SimulatedSettlement {
    failure_rate: f64,
}

impl SimulatedSettlement {
    /// Create a simulator failing `failure_rate` of orders (clamped to
    /// [0, 1]).
    #[must_use]
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl SettlementGateway for SimulatedSettlement {
    fn charge(&self, _order: &OrderRequest) -> Result<(), SettlementError> {
        if rand::random::<f64>() < self.failure_rate {
            Err(SettlementError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderRequest {
        OrderRequest {
            user_id: "u1".to_string(),
            item_id: "101".to_string(),
            amount: 1,
            request_id: "r1".to_string(),
        }
    }

    #[test]
    fn zero_rate_never_fails() {
        let settlement = SimulatedSettlement::new(0.0);
        for _ in 0..100 {
            assert!(settlement.charge(&order()).is_ok());
        }
    }

    #[test]
    fn full_rate_always_fails() {
        let settlement = SimulatedSettlement::new(1.0);
        for _ in 0..100 {
            assert_eq!(settlement.charge(&order()), Err(SettlementError::Timeout));
        }
    }

    #[test]
    fn rate_is_clamped() {
        assert!(SimulatedSettlement::new(7.0).charge(&order()).is_err());
        assert!(SimulatedSettlement::new(-3.0).charge(&order()).is_ok());
    }
}
