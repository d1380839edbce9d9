use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::queue::MessageQueue;
use crate::types::queue_message::QueueMessage;

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
}

/// In-process queue used by the dry-run backend and in tests.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryQueue {
    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, body: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        self.state.lock().await.ready.push_back(QueueMessage {
            id: id.clone(),
            receipt: String::new(),
            body: body.to_string(),
        });

        Ok(id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        let count = max.min(state.ready.len());
        let mut batch = Vec::with_capacity(count);

        for _ in 0..count {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };

            /* every delivery gets a fresh receipt, like SQS */
            message.receipt = Uuid::new_v4().to_string();
            state.in_flight.insert(message.receipt.clone(), message.clone());
            batch.push(message);
        }

        Ok(batch)
    }

    async fn acknowledge(&self, messages: &[QueueMessage]) -> Result<()> {
        let mut state = self.state.lock().await;

        for message in messages {
            if state.in_flight.remove(&message.receipt).is_none() {
                debug!(message_id = %message.id, "acknowledged message was not in flight");
            }
        }

        Ok(())
    }

    async fn release(&self, messages: &[QueueMessage]) -> Result<()> {
        let mut state = self.state.lock().await;

        for message in messages.iter().rev() {
            if let Some(message) = state.in_flight.remove(&message.receipt) {
                state.ready.push_front(message);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_send_order() {
        let queue = MemoryQueue::new();
        let first = queue.send("one").await.unwrap();
        let second = queue.send("two").await.unwrap();

        let batch = queue.receive(10).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, first);
        assert_eq!(batch[0].body, "one");
        assert_eq!(batch[1].id, second);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn receive_respects_max() {
        let queue = MemoryQueue::new();
        for body in ["a", "b", "c"] {
            queue.send(body).await.unwrap();
        }

        assert_eq!(queue.receive(2).await.unwrap().len(), 2);
        assert_eq!(queue.receive(2).await.unwrap().len(), 1);
        assert!(queue.receive(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn acknowledged_messages_are_gone() {
        let queue = MemoryQueue::new();
        queue.send("a").await.unwrap();

        let batch = queue.receive(10).await.unwrap();
        queue.acknowledge(&batch).await.unwrap();

        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn released_messages_are_redelivered_first_in_order() {
        let queue = MemoryQueue::new();
        for body in ["a", "b", "c"] {
            queue.send(body).await.unwrap();
        }

        let batch = queue.receive(2).await.unwrap();
        queue.release(&batch).await.unwrap();

        let redelivered = queue.receive(10).await.unwrap();
        let bodies: Vec<&str> = redelivered.iter().map(|m| m.body.as_str()).collect();

        assert_eq!(bodies, vec!["a", "b", "c"]);
        assert_eq!(redelivered[0].id, batch[0].id);
        assert_ne!(redelivered[0].receipt, batch[0].receipt);
    }
}
