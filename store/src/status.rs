//! Order status records.
//!
//! `order_status:<request_id>` holds the order's lifecycle value for 30
//! minutes - long enough for clients to poll the outcome of an accepted
//! order, short enough that the keyspace stays bounded without a reaper.

use crate::error::Result;
use flashsale_core::OrderStatus;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// How long a status record is readable after its last write.
pub const STATUS_TTL: Duration = Duration::from_secs(1800);

/// Reads and writes of per-order status records.
#[derive(Clone)]
pub struct OrderStatusStore {
    conn: ConnectionManager,
}

impl OrderStatusStore {
    /// Create a status store over a pooled connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn status_key(request_id: &str) -> String {
        format!("order_status:{request_id}")
    }

    /// Write `status` for `request_id`, refreshing the 30 minute TTL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure. The gateway
    /// treats the initial `PROCESSING` write as best-effort; the worker's
    /// terminal writes are logged but never fail the message.
    pub async fn set(&self, request_id: &str, status: OrderStatus) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(
                Self::status_key(request_id),
                status.as_str(),
                STATUS_TTL.as_secs(),
            )
            .await?;
        Ok(())
    }

    /// Read the current status, `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure. A stored
    /// value that is not a known status reads as `None` (it can only appear
    /// through manual keyspace edits).
    pub async fn get(&self, request_id: &str) -> Result<Option<OrderStatus>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::status_key(request_id)).await?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_key_shape() {
        assert_eq!(OrderStatusStore::status_key("r-1"), "order_status:r-1");
    }
}
