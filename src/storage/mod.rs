pub mod local_store;
#[cfg(test)]
pub mod memory_store;

use anyhow::Result;
use async_trait::async_trait;

pub type DynamicBlobStore = std::sync::Arc<dyn BlobStore>;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `body` under `key`, replacing anything already there.
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// URI of the store root, e.g. `s3://bucket`.
    fn uri(&self) -> String;
}
