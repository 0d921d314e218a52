//! Flash-sale fulfillment worker binary.

use flashsale_queue::{DeadLetterPublisher, OrderConsumer};
use flashsale_runtime::DlqStats;
use flashsale_store::{InventoryStore, OrderStatusStore};
use flashsale_worker::{Config, OrderProcessor, SimulatedSettlement, Worker};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
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

    info!(service = "worker", "Starting fulfillment worker");
    info!(
        redis = %config.redis_addr,
        kafka = %config.kafka_addr,
        consumer_group = %config.consumer_group,
        settlement_failure_rate = config.settlement_failure_rate,
        "Configuration loaded"
    );

    flashsale_runtime::metrics::install_exporter(config.metrics_addr.parse()?)?;

    let redis = flashsale_store::connect(&config.redis_addr).await?;
    let consumer = OrderConsumer::new(&config.kafka_addr, &config.consumer_group)?;
    let dlq = DeadLetterPublisher::new(&config.kafka_addr)?;
    let dlq_stats = Arc::new(DlqStats::new());

    let processor = OrderProcessor::new(
        InventoryStore::new(redis.clone()),
        OrderStatusStore::new(redis),
        dlq,
        Arc::clone(&dlq_stats),
        SimulatedSettlement::new(config.settlement_failure_rate),
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let worker_handle = Worker::new(consumer, processor, shutdown_tx.subscribe()).spawn();
    let age_handle = spawn_dlq_age_refresher(Arc::clone(&dlq_stats), shutdown_tx.subscribe());

    shutdown_signal().await;
    info!(service = "worker", "Shutting down");
    let _ = shutdown_tx.send(());

    for (name, handle) in [("worker", worker_handle), ("dlq-age", age_handle)] {
        match tokio::time::timeout(config.shutdown_timeout, handle).await {
            Ok(Ok(())) => info!(task = name, "Task stopped gracefully"),
            Ok(Err(e)) => warn!(task = name, error = %e, "Task failed"),
            Err(_) => warn!(task = name, "Task shutdown timed out"),
        }
    }

    info!(service = "worker", "Worker stopped");
    Ok(())
}

/// Keep the DLQ oldest-age gauge advancing between failures.
fn spawn_dlq_age_refresher(
    stats: Arc<DlqStats>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tick.tick() => stats.refresh_age(),
            }
        }
    })
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
