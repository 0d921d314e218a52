//! Idempotency key reservation.
//!
//! The gateway reserves `idempotency:<request_id>` with SET NX before it
//! enqueues an order, so two concurrent submissions of the same request id
//! cannot both publish. The key is released only on failures that occur
//! strictly between reservation and a committed enqueue; after a successful
//! publish it is left to expire, which is what makes retries of an
//! already-accepted request read as duplicates rather than new orders.

use crate::error::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// How long an admitted request id stays reserved.
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(600);

/// Sentinel stored under the key while the request id is held.
const SENTINEL: &str = "processing";

/// Reservation of per-request idempotency keys.
#[derive(Clone)]
pub struct IdempotencyStore {
    conn: ConnectionManager,
}

impl IdempotencyStore {
    /// Create an idempotency store over a pooled connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn idempotency_key(request_id: &str) -> String {
        format!("idempotency:{request_id}")
    }

    /// Atomically reserve `request_id`. Returns `true` if this caller won
    /// the reservation, `false` if the key already existed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure. The caller
    /// decides how a failure maps to a client response; the key is not
    /// created when an error is returned.
    pub async fn try_reserve(&self, request_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = Self::idempotency_key(request_id);

        // SET NX EX replies OK when the key was created and Nil when it
        // already existed, which FromRedisValue maps onto bool.
        let created: bool = redis::cmd("SET")
            .arg(&key)
            .arg(SENTINEL)
            .arg("NX")
            .arg("EX")
            .arg(IDEMPOTENCY_TTL.as_secs())
            .query_async(&mut conn)
            .await?;

        Ok(created)
    }

    /// Release a reservation after a post-reserve failure so the client can
    /// retry with the same request id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure; callers
    /// treat release as best-effort and log rather than propagate.
    pub async fn release(&self, request_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::idempotency_key(request_id)).await?;
        Ok(())
    }

    /// Whether `request_id` is currently reserved.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure.
    pub async fn is_reserved(&self, request_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::idempotency_key(request_id)).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_shape() {
        assert_eq!(
            IdempotencyStore::idempotency_key("r-1"),
            "idempotency:r-1"
        );
    }
}
