use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::pipeline::quote_persister::QuotePersister;
use crate::queue::DynamicQueue;

/// Pause before polling again after an empty receive.
const IDLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Empty,
    Persisted(usize),
    /// The batch was handed back to the queue; `persisted` objects were already written.
    Failed { persisted: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub batches: usize,
    pub persisted: usize,
    pub failed_batches: usize,
}

/// Feeds queue batches to the persister, acknowledging a batch only when all of it was stored.
pub struct QueueDrainer {
    queue: DynamicQueue,
    persister: QuotePersister,
    batch_size: usize,
    retry_delay: Duration,
}

impl QueueDrainer {
    pub fn new(
        queue: DynamicQueue,
        persister: QuotePersister,
        batch_size: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            queue,
            persister,
            batch_size,
            retry_delay,
        }
    }

    pub async fn drain_once(&mut self) -> Result<DrainOutcome> {
        let batch = self
            .queue
            .receive(self.batch_size)
            .await
            .context("failed to receive batch")?;

        if batch.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        debug!(size = batch.len(), "received batch");

        match self.persister.process_batch(&batch).await {
            Ok(report) => {
                self.queue
                    .acknowledge(&batch)
                    .await
                    .context("failed to acknowledge batch")?;

                info!(processed_count = report.persisted(), "batch persisted");

                Ok(DrainOutcome::Persisted(report.persisted()))
            }
            Err(failure) => {
                warn!(
                    message_id = %failure.message_id,
                    processed_count = failure.persisted,
                    batch_size = batch.len(),
                    "batch left for redelivery"
                );

                self.queue
                    .release(&batch)
                    .await
                    .context("failed to release batch")?;

                Ok(DrainOutcome::Failed {
                    persisted: failure.persisted,
                })
            }
        }
    }

    /// Drains until the queue is empty or a batch fails.
    pub async fn drain_available(&mut self) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();

        loop {
            match self.drain_once().await? {
                DrainOutcome::Empty => break,
                DrainOutcome::Persisted(count) => {
                    summary.batches += 1;
                    summary.persisted += count;
                }
                DrainOutcome::Failed { persisted } => {
                    summary.batches += 1;
                    summary.failed_batches += 1;
                    summary.persisted += persisted;
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Long-running queue trigger.
    pub async fn run(mut self) {
        loop {
            match self.drain_once().await {
                Ok(DrainOutcome::Persisted(_)) => {}
                Ok(DrainOutcome::Empty) => tokio::time::sleep(IDLE_DELAY).await,
                Ok(DrainOutcome::Failed { .. }) => tokio::time::sleep(self.retry_delay).await,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "queue drain failed");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::queue::MessageQueue;
    use crate::queue::memory_queue::MemoryQueue;
    use crate::storage::memory_store::MemoryBlobStore;
    use crate::types::stock_quote::StockQuote;

    fn drainer(queue: Arc<MemoryQueue>, store: Arc<MemoryBlobStore>, batch_size: usize) -> QueueDrainer {
        QueueDrainer::new(
            queue,
            QuotePersister::new(store, "stock_data"),
            batch_size,
            Duration::ZERO,
        )
    }

    async fn enqueue_quote(queue: &MemoryQueue, ticker: &str) {
        let body = StockQuote::new(ticker, 10.0, None, 1_700_000_000)
            .unwrap()
            .to_message_body()
            .unwrap();
        queue.send(&body).await.unwrap();
    }

    #[tokio::test]
    async fn empty_queue_is_not_an_error() {
        let queue = Arc::new(MemoryQueue::new());
        let mut drainer = drainer(queue, Arc::new(MemoryBlobStore::new()), 10);

        assert_eq!(drainer.drain_once().await.unwrap(), DrainOutcome::Empty);
    }

    #[tokio::test]
    async fn successful_batch_is_acknowledged() {
        let queue = Arc::new(MemoryQueue::new());
        let store = Arc::new(MemoryBlobStore::new());
        enqueue_quote(&queue, "AAPL").await;
        enqueue_quote(&queue, "GOOG").await;
        let mut drainer = drainer(queue.clone(), store.clone(), 10);

        assert_eq!(drainer.drain_once().await.unwrap(), DrainOutcome::Persisted(2));
        assert_eq!(drainer.drain_once().await.unwrap(), DrainOutcome::Empty);
        assert_eq!(queue.in_flight_len().await, 0);
        assert_eq!(store.objects().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_is_redelivered_whole() {
        let queue = Arc::new(MemoryQueue::new());
        let store = Arc::new(MemoryBlobStore::new());
        enqueue_quote(&queue, "AAPL").await;
        queue.send(r#"{"ticker":"GOOG"}"#).await.unwrap();
        let mut drainer = drainer(queue.clone(), store.clone(), 10);

        assert_eq!(
            drainer.drain_once().await.unwrap(),
            DrainOutcome::Failed { persisted: 1 }
        );
        assert_eq!(queue.ready_len().await, 2);
        assert_eq!(queue.in_flight_len().await, 0);

        /* redelivery writes the good message again under a new key */
        assert_eq!(
            drainer.drain_once().await.unwrap(),
            DrainOutcome::Failed { persisted: 1 }
        );
        assert_eq!(store.objects().await.len(), 2);
    }

    #[tokio::test]
    async fn drain_available_stops_when_empty() {
        let queue = Arc::new(MemoryQueue::new());
        let store = Arc::new(MemoryBlobStore::new());
        for ticker in ["A", "B", "C"] {
            enqueue_quote(&queue, ticker).await;
        }
        let mut drainer = drainer(queue, store.clone(), 2);

        let summary = drainer.drain_available().await.unwrap();

        assert_eq!(
            summary,
            DrainSummary {
                batches: 2,
                persisted: 3,
                failed_batches: 0
            }
        );
        assert_eq!(store.objects().await.len(), 3);
    }

    #[tokio::test]
    async fn drain_available_stops_at_failed_batch() {
        let queue = Arc::new(MemoryQueue::new());
        queue.send("garbage").await.unwrap();
        enqueue_quote(&queue, "AAPL").await;
        let mut drainer = drainer(queue.clone(), Arc::new(MemoryBlobStore::new()), 1);

        let summary = drainer.drain_available().await.unwrap();

        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.persisted, 0);
        assert_eq!(queue.ready_len().await, 2);
    }
}
