use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::storage::BlobStore;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Records every write; optionally fails writes whose key contains `fail_when_key_contains`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    writes: Mutex<usize>,
    fail_when_key_contains: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_when_key_contains: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub async fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.objects.lock().await.clone()
    }

    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        if let Some(pattern) = &self.fail_when_key_contains {
            if key.contains(pattern.as_str()) {
                anyhow::bail!("simulated storage outage for {key}");
            }
        }

        *self.writes.lock().await += 1;
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );

        Ok(())
    }

    fn uri(&self) -> String {
        "mem://bucket".to_string()
    }
}
