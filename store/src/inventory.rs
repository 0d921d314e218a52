//! Atomic inventory operations.
//!
//! The inventory counter is the only high-contention datum in the system, so
//! both mutations run as server-side Lua scripts: Redis executes scripts
//! single-threaded, which makes decrement-and-compensate atomic without any
//! client-side locking or watch/retry loop.
//!
//! The reserve script distinguishes "key absent" (inventory never seeded)
//! from "counter at zero" (sold out), and repairs its own decrement when the
//! counter would go negative. No other client observes the mid-script
//! excursion to -1.

use crate::error::{Result, StoreError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::LazyLock;
use std::time::Duration;

/// Deadline for either inventory script.
const SCRIPT_DEADLINE: Duration = Duration::from_secs(5);

static RESERVE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local inventory_key = KEYS[1]
        if redis.call('EXISTS', inventory_key) == 0 then
            return {0, -1, 'NOT_INITIALIZED'}
        end

        local stock = redis.call('DECR', inventory_key)
        if stock < 0 then
            redis.call('INCR', inventory_key)
            return {0, stock, 'SOLD_OUT'}
        end
        return {1, stock, 'SUCCESS'}
        ",
    )
});

static REFUND_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local inventory_key = KEYS[1]
        local amount = tonumber(ARGV[1])
        if not amount or amount <= 0 then
            return {0, 0}
        end

        local stock = redis.call('INCRBY', inventory_key, amount)
        return {1, stock}
        ",
    )
});

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// One unit was committed; `remaining` is the stock left after it.
    Reserved {
        /// Stock remaining after the decrement.
        remaining: i64,
    },
    /// The counter was at zero; the compensating increment already ran.
    SoldOut {
        /// The negative value the script observed before repairing it.
        observed: i64,
    },
    /// The inventory key does not exist - the item was never seeded.
    NotInitialized,
}

/// Outcome of a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundOutcome {
    /// Whether the increment was applied (false only for invalid amounts).
    pub applied: bool,
    /// Stock level after the refund.
    pub stock: i64,
}

/// Atomic operations against `inventory:<item_id>` counters.
#[derive(Clone)]
pub struct InventoryStore {
    conn: ConnectionManager,
}

impl InventoryStore {
    /// Create an inventory store over a pooled connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn inventory_key(item_id: &str) -> String {
        format!("inventory:{item_id}")
    }

    /// Atomically reserve one unit of `item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the 5 second script deadline
    /// elapses, [`StoreError::Command`] for other Redis failures, and
    /// [`StoreError::UnexpectedReply`] if the script reply cannot be decoded.
    pub async fn reserve(&self, item_id: &str) -> Result<ReserveOutcome> {
        let mut conn = self.conn.clone();
        let key = Self::inventory_key(item_id);

        let (success, stock, reason): (i64, i64, String) = tokio::time::timeout(
            SCRIPT_DEADLINE,
            RESERVE_SCRIPT.key(&key).invoke_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Timeout { op: "reserve" })??;

        match (success, reason.as_str()) {
            (1, "SUCCESS") => Ok(ReserveOutcome::Reserved { remaining: stock }),
            (0, "SOLD_OUT") => Ok(ReserveOutcome::SoldOut { observed: stock }),
            (0, "NOT_INITIALIZED") => Ok(ReserveOutcome::NotInitialized),
            _ => Err(StoreError::UnexpectedReply(format!(
                "reserve returned ({success}, {stock}, {reason})"
            ))),
        }
    }

    /// Atomically return `amount` units to `item_id`, creating the key if it
    /// is absent.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`InventoryStore::reserve`].
    pub async fn refund(&self, item_id: &str, amount: u32) -> Result<RefundOutcome> {
        let mut conn = self.conn.clone();
        let key = Self::inventory_key(item_id);

        let (success, stock): (i64, i64) = tokio::time::timeout(
            SCRIPT_DEADLINE,
            REFUND_SCRIPT.key(&key).arg(i64::from(amount)).invoke_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Timeout { op: "refund" })??;

        Ok(RefundOutcome {
            applied: success == 1,
            stock,
        })
    }

    /// Read the current stock level, `None` when the item was never seeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Command`] on Redis failure.
    pub async fn level(&self, item_id: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let level: Option<i64> = conn.get(Self::inventory_key(item_id)).await?;
        Ok(level)
    }

    /// Seed the counter for an item. Used by operational tooling and tests;
    /// the pipeline itself never creates inventory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Command`] on Redis failure.
    pub async fn seed(&self, item_id: &str, stock: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(Self::inventory_key(item_id), stock).await?;
        Ok(())
    }
}
