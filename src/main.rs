mod aws;
mod config;
mod market;
mod pipeline;
mod queue;
mod scenario;
mod storage;
mod types;
mod yahoo;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::pipeline_config::PipelineConfig;
use crate::pipeline::manifest_writer::ManifestWriter;
use crate::pipeline::queue_drainer::{DrainOutcome, QueueDrainer};
use crate::pipeline::quote_fetcher::QuoteFetcher;
use crate::pipeline::quote_persister::QuotePersister;
use crate::scenario::backends::BackendKind;
use crate::scenario::scenario::Scenario;

#[derive(Debug, Clone, Parser)]
struct Args {
    #[arg(long, value_enum, default_value = "dry-run", global = true)]
    pub backend: BackendKind,

    #[arg(long, default_value = "pipeline.yml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch every configured ticker once and publish the quotes.
    Fetch,
    /// Drain the queue into the blob store.
    Persist {
        /// Process a single batch and stop.
        #[arg(long)]
        once: bool,
    },
    /// Write the storage manifest.
    Manifest,
    /// Fetch on a timer and persist continuously until interrupted.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("quote_ingest=debug".parse()?),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = PipelineConfig::load(&args.config)?;

    match args.command {
        Command::Fetch => fetch(args.backend, &config).await,
        Command::Persist { once } => persist(args.backend, &config, once).await,
        Command::Manifest => write_manifest(args.backend, &config).await,
        Command::Run => run(args.backend, &config).await,
    }
}

fn fetcher(backend: BackendKind, config: &PipelineConfig) -> Result<QuoteFetcher> {
    Ok(QuoteFetcher::new(
        Scenario::quote_source(config)?,
        Scenario::queue(backend, config)?,
        config.request_delay(),
    ))
}

async fn fetch(backend: BackendKind, config: &PipelineConfig) -> Result<()> {
    if backend == BackendKind::DryRun {
        warn!("dry-run queue lives in this process only; use `run` to persist fetched quotes");
    }

    let summary = fetcher(backend, config)?.run(&config.tickers).await;

    if summary.success_count == 0 && summary.failed_count > 0 {
        anyhow::bail!("every ticker failed ({} failures)", summary.failed_count);
    }

    Ok(())
}

async fn persist(backend: BackendKind, config: &PipelineConfig, once: bool) -> Result<()> {
    let persister = QuotePersister::new(
        Scenario::blob_store(backend, config)?,
        &config.storage.prefix,
    );
    let mut drainer = QueueDrainer::new(
        Scenario::queue(backend, config)?,
        persister,
        config.queue.batch_size,
        config.retry_delay(),
    );

    let failed = if once {
        let outcome = drainer.drain_once().await?;
        info!(?outcome, "single batch drained");
        matches!(outcome, DrainOutcome::Failed { .. })
    } else {
        let summary = drainer.drain_available().await?;
        info!(
            batches = summary.batches,
            processed_count = summary.persisted,
            failed_batches = summary.failed_batches,
            "queue drained"
        );
        summary.failed_batches > 0
    };

    if failed {
        anyhow::bail!("a batch failed to persist and was left on the queue for redelivery");
    }

    Ok(())
}

async fn write_manifest(backend: BackendKind, config: &PipelineConfig) -> Result<()> {
    let writer = ManifestWriter::new(
        Scenario::blob_store(backend, config)?,
        &config.storage.prefix,
        &config.storage.manifest_key,
    );

    writer.write().await?;

    Ok(())
}

async fn run(backend: BackendKind, config: &PipelineConfig) -> Result<()> {
    let queue = Scenario::queue(backend, config)?;
    let fetcher = QuoteFetcher::new(
        Scenario::quote_source(config)?,
        queue.clone(),
        config.request_delay(),
    );
    let drainer = QueueDrainer::new(
        queue,
        QuotePersister::new(
            Scenario::blob_store(backend, config)?,
            &config.storage.prefix,
        ),
        config.queue.batch_size,
        config.retry_delay(),
    );

    let drain_task = tokio::spawn(drainer.run());

    let mut ticker = tokio::time::interval(config.fetch_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        tickers = ?config.tickers,
        interval_secs = config.fetch_interval_secs,
        "pipeline running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                fetcher.run(&config.tickers).await;
            }

            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    error!("failed to listen for shutdown signal: {error:?}");
                }
                info!("shutting down");
                break;
            }
        }
    }

    drain_task.abort();

    Ok(())
}
