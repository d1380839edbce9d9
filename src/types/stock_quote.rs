use std::fmt;

use anyhow::{Result, anyhow};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A normalized price observation for one ticker, as carried on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub ticker: String,
    pub price: f64,
    pub currency: String,
    pub timestamp: String,
}

impl StockQuote {
    pub fn new(
        ticker: &str,
        price: f64,
        currency: Option<String>,
        epoch_seconds: i64,
    ) -> Result<Self> {
        if ticker.trim().is_empty() {
            anyhow::bail!("ticker must not be empty");
        }
        if !price.is_finite() {
            anyhow::bail!("price for {ticker} must be finite, got {price}");
        }

        Ok(Self {
            ticker: ticker.to_uppercase(),
            price,
            currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            timestamp: format_epoch(epoch_seconds)?,
        })
    }

    pub fn to_message_body(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for StockQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.ticker, self.price, self.currency, self.timestamp
        )
    }
}

/// Renders epoch seconds as a sortable `YYYY-MM-DD_HH-MM-SS` string in UTC.
pub fn format_epoch(epoch_seconds: i64) -> Result<String> {
    let time = DateTime::from_timestamp(epoch_seconds, 0)
        .ok_or_else(|| anyhow!("epoch timestamp out of range: {epoch_seconds}"))?;

    Ok(time.format(TIMESTAMP_FORMAT).to_string())
}
