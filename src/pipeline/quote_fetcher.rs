use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::market::quote_source::QuoteSource;
use crate::queue::DynamicQueue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub success_count: usize,
    pub failed_count: usize,
}

/// Pulls the latest quote for each ticker and publishes it to the queue.
pub struct QuoteFetcher {
    source: Arc<dyn QuoteSource>,
    queue: DynamicQueue,
    request_delay: Duration,
}

impl QuoteFetcher {
    pub fn new(source: Arc<dyn QuoteSource>, queue: DynamicQueue, request_delay: Duration) -> Self {
        Self {
            source,
            queue,
            request_delay,
        }
    }

    /// One fetch cycle. A failing ticker is logged and counted, never fatal.
    pub async fn run(&self, tickers: &[String]) -> FetchSummary {
        let mut summary = FetchSummary::default();

        for (index, ticker) in tickers.iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.fetch_and_publish(ticker).await {
                Ok(()) => summary.success_count += 1,
                Err(_) => summary.failed_count += 1,
            }
        }

        info!(
            success_count = summary.success_count,
            failed_count = summary.failed_count,
            "fetch cycle complete"
        );

        summary
    }

    async fn fetch_and_publish(&self, ticker: &str) -> Result<()> {
        let quote = match self.source.latest_quote(ticker).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(%ticker, error = %e, "failed to fetch quote");
                return Err(e.into());
            }
        };

        info!(
            %ticker,
            price = quote.price,
            timestamp = %quote.timestamp,
            "retrieved price"
        );

        let published = match quote.to_message_body() {
            Ok(body) => self.queue.send(&body).await.context("queue rejected message"),
            Err(e) => Err(e),
        };

        match published {
            Ok(message_id) => {
                info!(%ticker, %message_id, "quote published");
                Ok(())
            }
            Err(e) => {
                error!(%ticker, error = %format!("{e:#}"), "failed to publish quote");
                Err(e)
            }
        }
    }
}
