//! Redis state layer for the flash-sale pipeline.
//!
//! All cross-process mutable state lives behind this crate:
//!
//! - **Inventory counters** (`inventory:<item_id>`) mutated only through two
//!   server-side Lua scripts, so reservation and refund are atomic under any
//!   number of concurrent workers.
//! - **Idempotency keys** (`idempotency:<request_id>`) reserved with
//!   SET NX before an order is enqueued.
//! - **Order status records** (`order_status:<request_id>`) tracking each
//!   order from `PROCESSING` to a terminal value.
//! - **Rate-limit counters** (`ratelimit:<user_id>`) implementing a
//!   fixed-window quota.
//!
//! Connections are pooled through `redis::aio::ConnectionManager`, which
//! reconnects transparently; callers clone the manager per operation.
//! Mutations are single atomic primitives (SET NX, INCR, scripts), so no
//! client-side locking exists anywhere in the pipeline. Script calls are
//! bounded by explicit deadlines and report expiry as
//! [`StoreError::Timeout`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod idempotency;
pub mod inventory;
pub mod rate_limit;
pub mod status;

pub use error::{Result, StoreError};
pub use idempotency::IdempotencyStore;
pub use inventory::{InventoryStore, RefundOutcome, ReserveOutcome};
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision};
pub use status::OrderStatusStore;

use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;

/// Connect to Redis, accepting either a bare `host:port` address (as the
/// deployment environment supplies) or a full `redis://` URL.
///
/// # Errors
///
/// Returns [`StoreError::Connection`] if the client cannot be created or the
/// initial connection fails.
pub async fn connect(addr: &str) -> Result<ConnectionManager> {
    let url = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    };

    let client = Client::open(url.as_str())
        .map_err(|e| StoreError::Connection(format!("failed to create Redis client: {e}")))?;

    let manager = ConnectionManager::new(client)
        .await
        .map_err(|e| StoreError::Connection(format!("failed to connect to Redis: {e}")))?;

    tracing::info!(addr = %addr, "Connected to Redis");
    Ok(manager)
}

/// Probe store liveness with a `PING` bounded by `deadline`.
///
/// Used by the gateway health endpoint (2 second deadline). Any failure -
/// timeout, I/O error, unexpected reply - reads as "not healthy".
pub async fn ping(conn: &ConnectionManager, deadline: Duration) -> bool {
    let mut conn = conn.clone();
    let probe = async {
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|reply| reply == "PONG")
            .unwrap_or(false)
    };

    tokio::time::timeout(deadline, probe).await.unwrap_or(false)
}
