//! Worker configuration, loaded from environment variables with the
//! deployment's defaults.

use std::env;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis address (`host:port` or full URL).
    pub redis_addr: String,
    /// Kafka broker address list.
    pub kafka_addr: String,
    /// Consumer group shared by worker replicas.
    pub consumer_group: String,
    /// Log level when `RUST_LOG` is not set.
    pub log_level: String,
    /// Address the Prometheus scrape listener binds to.
    pub metrics_addr: String,
    /// Probability in [0, 1] that the simulated settlement step fails.
    pub settlement_failure_rate: f64,
    /// How long to wait for the in-flight message on shutdown.
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
            consumer_group: env::var("CONSUMER_GROUP")
                .unwrap_or_else(|_| "flashsale-worker".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            metrics_addr: env::var("METRICS_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:9090".to_string()),
            settlement_failure_rate: env_parse("SETTLEMENT_FAILURE_RATE", 0.1),
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
