use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    aws::{aws_config::AwsConfig, s3_store::S3BlobStore, sqs_queue::SqsQueue},
    config::pipeline_config::PipelineConfig,
    market::quote_source::QuoteSource,
    queue::{DynamicQueue, memory_queue::MemoryQueue},
    scenario::backends::BackendKind,
    storage::{DynamicBlobStore, local_store::LocalBlobStore},
    yahoo::yahoo_client::YahooChartClient,
};

pub struct Scenario;

impl Scenario {
    pub fn queue(kind: BackendKind, config: &PipelineConfig) -> Result<DynamicQueue> {
        tracing::info!(backend = %kind, "creating queue");

        let queue: DynamicQueue = match kind {
            BackendKind::DryRun => Arc::new(MemoryQueue::new()),
            BackendKind::Aws => {
                let queue_url = config
                    .queue
                    .url
                    .as_deref()
                    .context("queue.url must be set for the aws backend")?;

                Arc::new(SqsQueue::new(
                    AwsConfig::from_env()?,
                    queue_url,
                    config.queue.wait_time_secs,
                )?)
            }
        };

        Ok(queue)
    }

    pub fn blob_store(kind: BackendKind, config: &PipelineConfig) -> Result<DynamicBlobStore> {
        tracing::info!(backend = %kind, "creating blob store");

        let store: DynamicBlobStore = match kind {
            BackendKind::DryRun => Arc::new(LocalBlobStore::new(&config.storage.local_root)),
            BackendKind::Aws => Arc::new(S3BlobStore::new(
                AwsConfig::from_env()?,
                config.storage.bucket.as_str(),
                config.storage.endpoint.as_deref(),
            )?),
        };

        Ok(store)
    }

    pub fn quote_source(config: &PipelineConfig) -> Result<Arc<dyn QuoteSource>> {
        Ok(Arc::new(YahooChartClient::new(&config.chart)?))
    }
}
