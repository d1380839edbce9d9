pub mod memory_queue;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::queue_message::QueueMessage;

pub type DynamicQueue = std::sync::Arc<dyn MessageQueue>;

/// At-least-once message queue. A received message stays owned by the queue until it is
/// acknowledged; anything not acknowledged is delivered again.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publishes `body` and returns the queue-assigned message id.
    async fn send(&self, body: &str) -> Result<String>;

    /// Receives up to `max` messages. An empty vec means nothing is available right now.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>>;

    async fn acknowledge(&self, messages: &[QueueMessage]) -> Result<()>;

    /// Hands messages back for redelivery. Queues with a visibility timeout can rely on it
    /// expiring instead.
    async fn release(&self, _messages: &[QueueMessage]) -> Result<()> {
        Ok(())
    }
}
