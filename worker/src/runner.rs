//! The consumer loop.
//!
//! One [`Worker`] owns one partition consumer; within it, messages are
//! processed strictly sequentially so offset commits never run ahead of
//! processing. Replicas scale out by joining the same consumer group and
//! taking partitions. Receive errors are logged and retried after a delay
//! rather than crashing the loop; redelivery is the queue's job.

use crate::processor::OrderProcessor;
use crate::settlement::SettlementGateway;
use flashsale_queue::OrderConsumer;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Long-running consume-process loop with graceful shutdown.
pub struct Worker<S> {
    consumer: OrderConsumer,
    processor: OrderProcessor<S>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl<S: SettlementGateway + Send + Sync + 'static> Worker<S> {
    /// Wire up a worker.
    #[must_use]
    pub fn new(
        consumer: OrderConsumer,
        processor: OrderProcessor<S>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            consumer,
            processor,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Spawn the loop as a background task.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        info!(service = "worker", "Fulfillment worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(service = "worker", "Worker received shutdown signal");
                    break;
                }
                received = self.consumer.recv() => {
                    match received {
                        Ok(message) => {
                            // Outcome already logged and metered; the loop
                            // only cares that processing finished.
                            let _ = self.processor.process(&message).await;
                        }
                        Err(e) => {
                            error!(
                                service = "worker",
                                error = %e,
                                "Failed to receive message, retrying in {:?}",
                                self.retry_delay
                            );
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        info!(service = "worker", "Fulfillment worker stopped");
    }
}
