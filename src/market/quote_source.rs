use async_trait::async_trait;
use thiserror::Error;

use crate::types::stock_quote::StockQuote;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart request failed: {0}")]
    Transport(String),

    #[error("chart endpoint returned http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chart endpoint reported {code}: {description}")]
    Upstream { code: String, description: String },

    #[error("malformed chart response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_quote(&self, ticker: &str) -> Result<StockQuote, ChartError>;
}
