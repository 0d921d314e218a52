//! Per-user fixed-window rate limiting.
//!
//! # Algorithm
//!
//! Fixed-window counter over `ratelimit:<user_id>`:
//! 1. INCR the user's counter.
//! 2. If the returned value is 1 the window just opened - set the TTL.
//! 3. Allow iff the counter is within `max_requests`.
//!
//! The window starts at the first request after key absence, so a burst
//! spanning a window edge can briefly exceed the quota globally but never
//! within one window. The gateway fails open on store errors: dropping
//! traffic because the limiter's backing store hiccuped would be worse than
//! briefly not limiting.

use crate::error::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is within quota.
    pub allowed: bool,
    /// Requests left in the current window (0 when over quota).
    pub remaining: u32,
}

/// Fixed-window rate limiter over the shared store.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    conn: ConnectionManager,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `max_requests` per `window` per user.
    #[must_use]
    pub const fn new(conn: ConnectionManager, max_requests: u32, window: Duration) -> Self {
        Self {
            conn,
            max_requests,
            window,
        }
    }

    fn rate_key(user_id: &str) -> String {
        format!("ratelimit:{user_id}")
    }

    /// Window length, exposed for `retry_after_seconds` in 429 responses.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Count one request from `user_id` and decide whether to admit it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure; the caller
    /// chooses the failure policy (the gateway fails open).
    pub async fn allow(&self, user_id: &str) -> Result<RateLimitDecision> {
        let mut conn = self.conn.clone();
        let key = Self::rate_key(user_id);

        let count: u64 = conn.incr(&key, 1u32).await?;

        // First hit opens the window; the TTL bounds the counter's life.
        if count == 1 {
            let _: () = conn.expire(&key, self.window.as_secs() as i64).await?;
        }

        let allowed = count <= u64::from(self.max_requests);
        let remaining = u32::try_from(u64::from(self.max_requests).saturating_sub(count))
            .unwrap_or(0);

        if !allowed {
            tracing::warn!(
                user_id = %user_id,
                count = count,
                max_requests = self.max_requests,
                "Rate limit exceeded"
            );
        }

        Ok(RateLimitDecision { allowed, remaining })
    }

    /// Requests left for `user_id` in the current window without counting
    /// one. Absent key means full quota.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Command`] on Redis failure.
    pub async fn remaining(&self, user_id: &str) -> Result<u32> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(Self::rate_key(user_id)).await?;

        Ok(match count {
            None => self.max_requests,
            Some(n) => u32::try_from(u64::from(self.max_requests).saturating_sub(n)).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_key_shape() {
        assert_eq!(FixedWindowLimiter::rate_key("u9"), "ratelimit:u9");
    }
}
