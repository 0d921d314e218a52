//! Flash-sale gateway binary.

use flashsale_gateway::config::Config;
use flashsale_gateway::server::build_router;
use flashsale_gateway::state::AppState;
use flashsale_queue::OrderProducer;
use flashsale_runtime::{CircuitBreaker, GatewayMetrics};
use flashsale_store::{FixedWindowLimiter, IdempotencyStore, OrderStatusStore};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(service = "gateway", "Starting flash-sale gateway");
    info!(
        redis = %config.redis_addr,
        kafka = %config.kafka_addr,
        rate_limit_max = config.rate_limit_max_requests,
        "Configuration loaded"
    );

    let redis = flashsale_store::connect(&config.redis_addr).await?;

    let producer = Arc::new(
        OrderProducer::builder()
            .brokers(&config.kafka_addr)
            .acks("1")
            .build()?,
    );

    let breaker = CircuitBreaker::new(config.breaker.clone());
    let metrics = flashsale_runtime::metrics::install_recorder()?;
    GatewayMetrics::record_breaker_state(breaker.state());

    let state = AppState {
        idempotency: IdempotencyStore::new(redis.clone()),
        statuses: OrderStatusStore::new(redis.clone()),
        limiter: FixedWindowLimiter::new(
            redis.clone(),
            config.rate_limit_max_requests,
            config.rate_limit_window,
        ),
        redis,
        producer,
        breaker,
        metrics,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Gateway listening");

    // Drain is bounded by the per-request 30 s deadline: once the shutdown
    // signal fires, no in-flight request can outlive its timeout layer.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = "gateway", "Gateway stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        }
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        }
    }
}
