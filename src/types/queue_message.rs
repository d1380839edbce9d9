/// A message as handed out by a queue, before it has been acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    /// Opaque handle the queue needs to acknowledge or release this delivery.
    pub receipt: String,
    pub body: String,
}
