//! Error types for store operations.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the Redis state layer.
///
/// `Timeout` is distinguishable from `Command` because the two route
/// differently downstream: a timed-out reserve dead-letters as
/// `Redis Timeout`, any other failure as `Redis Failure`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not establish or re-establish a connection.
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A command or script failed on the server or in transit.
    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// The operation's deadline elapsed before a reply arrived.
    #[error("store operation '{op}' timed out")]
    Timeout {
        /// Name of the operation that expired.
        op: &'static str,
    },

    /// A script returned a reply shape this crate does not understand.
    #[error("unexpected script reply: {0}")]
    UnexpectedReply(String),
}

impl StoreError {
    /// True when the error is a deadline expiry rather than a hard failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
