use anyhow::{Context, Result};
use tracing::info;

use crate::storage::{DynamicBlobStore, JSON_CONTENT_TYPE};
use crate::types::manifest::Manifest;

pub struct ManifestWriter {
    store: DynamicBlobStore,
    prefix: String,
    key: String,
}

impl ManifestWriter {
    pub fn new(store: DynamicBlobStore, prefix: &str, key: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            key: key.to_string(),
        }
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::for_prefix(&self.store.uri(), &self.prefix)
    }

    /// Writes the manifest, overwriting any previous copy. Returns the key written.
    pub async fn write(&self) -> Result<&str> {
        let body = serde_json::to_vec(&self.manifest()).context("failed to encode manifest")?;

        self.store
            .put_object(&self.key, body, JSON_CONTENT_TYPE)
            .await
            .with_context(|| format!("failed to write manifest {}", self.key))?;

        info!(key = %self.key, store = %self.store.uri(), "manifest written");

        Ok(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::memory_store::MemoryBlobStore;

    #[tokio::test]
    async fn writes_manifest_at_configured_key() {
        let store = Arc::new(MemoryBlobStore::new());
        let writer = ManifestWriter::new(store.clone(), "stock_data", "manifest.json");

        assert_eq!(writer.write().await.unwrap(), "manifest.json");

        let objects = store.objects().await;
        let stored = &objects["manifest.json"];
        assert_eq!(stored.content_type, "application/json");

        let manifest: Manifest = serde_json::from_slice(&stored.body).unwrap();
        assert_eq!(
            manifest.file_locations[0].uri_prefixes,
            vec!["mem://bucket/stock_data/".to_string()]
        );
        assert_eq!(manifest.global_upload_settings.format, "JSON");
    }

    #[tokio::test]
    async fn rewriting_is_byte_identical() {
        let store = Arc::new(MemoryBlobStore::new());
        let writer = ManifestWriter::new(store.clone(), "stock_data", "manifest.json");

        writer.write().await.unwrap();
        let first = store.objects().await["manifest.json"].body.clone();
        writer.write().await.unwrap();
        let second = store.objects().await["manifest.json"].body.clone();

        assert_eq!(first, second);
        assert_eq!(store.write_count().await, 2);
        assert_eq!(store.objects().await.len(), 1);
    }

    #[tokio::test]
    async fn storage_errors_are_fatal() {
        let store = Arc::new(MemoryBlobStore::failing_on("manifest"));
        let writer = ManifestWriter::new(store, "stock_data", "manifest.json");

        assert!(writer.write().await.is_err());
    }
}
