//! Gateway configuration, loaded from environment variables with the
//! deployment's defaults.

use flashsale_runtime::CircuitBreakerConfig;
use std::env;
use std::time::Duration;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis address (`host:port` or full URL).
    pub redis_addr: String,
    /// Kafka broker address list.
    pub kafka_addr: String,
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Log level when `RUST_LOG` is not set.
    pub log_level: String,
    /// Producer circuit breaker tuning.
    pub breaker: CircuitBreakerConfig,
    /// Rate limit: requests allowed per window per user.
    pub rate_limit_max_requests: u32,
    /// Rate limit: window length.
    pub rate_limit_window: Duration,
    /// How long to wait for in-flight requests on shutdown.
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment, falling back to the
    /// in-cluster defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            redis_addr: env::var("REDIS_ADDR")
                .unwrap_or_else(|_| "redis-service:6379".to_string()),
            kafka_addr: env::var("KAFKA_ADDR")
                .unwrap_or_else(|_| "kafka-service:9092".to_string()),
            listen_addr: env::var("GATEWAY_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            breaker: CircuitBreakerConfig {
                failure_threshold: env_parse("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5),
                success_threshold: env_parse("CIRCUIT_BREAKER_SUCCESS_THRESHOLD", 2),
                base_timeout: Duration::from_secs(env_parse(
                    "CIRCUIT_BREAKER_BASE_TIMEOUT",
                    30,
                )),
                max_timeout: Duration::from_secs(env_parse(
                    "CIRCUIT_BREAKER_MAX_TIMEOUT",
                    300,
                )),
                reset_interval: Duration::from_secs(60),
            },
            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 60),
            rate_limit_window: Duration::from_secs(env_parse("RATE_LIMIT_WINDOW", 60)),
            shutdown_timeout: Duration::from_secs(env_parse("SHUTDOWN_TIMEOUT", 30)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
