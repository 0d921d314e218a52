//! Circuit breaker guarding the queue producer.
//!
//! The breaker prevents reservation churn during a broker outage: once it
//! opens, the gateway rejects orders before touching the idempotency
//! keyspace, so clients see a clean 503 and can retry with the same
//! request id.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive failures are counted and
//!   passively reset on an interval.
//! - **Open**: calls are rejected immediately. After the current timeout
//!   elapses the breaker admits probes.
//! - **HalfOpen**: up to `success_threshold` concurrent probes are
//!   admitted. Enough consecutive successes close the breaker; any failure
//!   reopens it, and the open timeout grows exponentially up to
//!   `max_timeout` across consecutive trips.
//!
//! The current state is mirrored into an atomic so `state()` never takes
//! the lock - the health endpoint and the state gauge read it on every
//! request without contending with the enqueue path.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// Consecutive probe successes before the circuit closes again. Also
    /// bounds how many probes may run concurrently in `HalfOpen`.
    pub success_threshold: usize,
    /// Open duration after the first trip.
    pub base_timeout: Duration,
    /// Upper bound on the open duration under exponential backoff.
    pub max_timeout: Duration,
    /// Interval on which the Closed-state failure count passively resets.
    pub reset_interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            base_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(300),
            reset_interval: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    /// Set the consecutive-failure threshold.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the probe success threshold.
    #[must_use]
    pub const fn success_threshold(mut self, threshold: usize) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    /// Set the base open timeout.
    #[must_use]
    pub const fn base_timeout(mut self, timeout: Duration) -> Self {
        self.config.base_timeout = timeout;
        self
    }

    /// Set the backoff ceiling.
    #[must_use]
    pub const fn max_timeout(mut self, timeout: Duration) -> Self {
        self.config.max_timeout = timeout;
        self
    }

    /// Set the Closed-state passive reset interval.
    #[must_use]
    pub const fn reset_interval(mut self, interval: Duration) -> Self {
        self.config.reset_interval = interval;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        self.config
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Calls pass through normally.
    Closed,
    /// Calls are rejected immediately.
    Open,
    /// A bounded number of probe calls are admitted.
    HalfOpen,
}

impl State {
    /// Gauge encoding: Closed=0, Open=1, HalfOpen=2.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        })
    }
}

/// Errors from calls made through the breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: State,
    consecutive_failures: usize,
    probe_successes: usize,
    probes_inflight: usize,
    opened_at: Option<Instant>,
    trip_count: u32,
    last_reset: Instant,
}

/// Three-state guard around a fallible async operation.
///
/// Cloning shares the underlying state, so the admission path, the health
/// endpoint, and the gauge all observe the same breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<RwLock<BreakerState>>,
    // Mirror of inner.state for lock-free reads.
    snapshot: Arc<AtomicU8>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(RwLock::new(BreakerState {
                state: State::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                probes_inflight: 0,
                opened_at: None,
                trip_count: 0,
                last_reset: Instant::now(),
            })),
            snapshot: Arc::new(AtomicU8::new(State::Closed.as_u8())),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current state, read without locking.
    ///
    /// The mirror is updated on every transition; an Open breaker whose
    /// timeout has elapsed still reads Open until the next probe is
    /// admitted, which is the reading the health endpoint wants.
    #[must_use]
    pub fn state(&self) -> State {
        State::from_u8(self.snapshot.load(Ordering::Acquire))
    }

    /// Total calls rejected while open.
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    /// Run `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] without invoking the operation when
    /// the circuit is open (or the half-open probe quota is taken), and
    /// [`BreakerError::Inner`] when the operation itself fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            return Err(BreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Effective open timeout for the current trip count:
    /// `base * 2^min(trips-1, 10)`, clamped to `max_timeout`.
    fn open_timeout(&self, trip_count: u32) -> Duration {
        let exponent = trip_count.saturating_sub(1).min(10);
        let timeout = self
            .config
            .base_timeout
            .saturating_mul(2u32.saturating_pow(exponent));
        timeout.min(self.config.max_timeout)
    }

    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.write().await;
        match inner.state {
            State::Closed => {
                if inner.last_reset.elapsed() >= self.config.reset_interval {
                    inner.consecutive_failures = 0;
                    inner.last_reset = Instant::now();
                }
                true
            }
            State::Open => {
                let timeout = self.open_timeout(inner.trip_count);
                let elapsed = inner.opened_at.is_some_and(|at| at.elapsed() >= timeout);
                if elapsed {
                    tracing::info!(
                        trips = inner.trip_count,
                        "Circuit breaker transitioning OPEN -> HALF_OPEN"
                    );
                    self.transition(&mut inner, State::HalfOpen);
                    inner.probe_successes = 0;
                    inner.probes_inflight = 1;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => {
                if inner.probes_inflight < self.config.success_threshold {
                    inner.probes_inflight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            State::Closed => {
                inner.consecutive_failures = 0;
            }
            State::HalfOpen => {
                inner.probes_inflight = inner.probes_inflight.saturating_sub(1);
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.probe_successes,
                        "Circuit breaker transitioning HALF_OPEN -> CLOSED"
                    );
                    self.transition(&mut inner, State::Closed);
                    inner.consecutive_failures = 0;
                    inner.probe_successes = 0;
                    inner.probes_inflight = 0;
                    inner.opened_at = None;
                    inner.trip_count = 0;
                    inner.last_reset = Instant::now();
                }
            }
            State::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker transitioning CLOSED -> OPEN"
                    );
                    self.trip(&mut inner);
                }
            }
            State::HalfOpen => {
                tracing::warn!("Circuit breaker transitioning HALF_OPEN -> OPEN (probe failed)");
                inner.probe_successes = 0;
                inner.probes_inflight = 0;
                self.trip(&mut inner);
            }
            State::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    fn trip(&self, inner: &mut BreakerState) {
        inner.trip_count += 1;
        inner.opened_at = Some(Instant::now());
        self.transition(inner, State::Open);
    }

    fn transition(&self, inner: &mut BreakerState, next: State) {
        inner.state = next;
        self.snapshot.store(next.as_u8(), Ordering::Release);
    }

    /// Force the breaker back to Closed. Operational escape hatch and test
    /// helper.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        tracing::info!("Circuit breaker manually reset to CLOSED");
        self.transition(&mut inner, State::Closed);
        inner.consecutive_failures = 0;
        inner.probe_successes = 0;
        inner.probes_inflight = 0;
        inner.opened_at = None;
        inner.trip_count = 0;
        inner.last_reset = Instant::now();
    }
}
