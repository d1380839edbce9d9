//! Shape of the v8 chart endpoint body, trimmed to the fields the fetcher reads.

use serde::Deserialize;

use crate::market::quote_source::ChartError;
use crate::types::stock_quote::StockQuote;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartData>>,
    #[serde(default)]
    pub error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartData {
    /* Absent entirely when the market has produced no bars today */
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    #[serde(default)]
    pub indicators: Indicators,
    #[serde(default)]
    pub meta: ChartMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteSeries {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub currency: Option<String>,
}

impl ChartResponse {
    pub fn from_json(text: &str) -> Result<Self, ChartError> {
        serde_json::from_str(text).map_err(|e| ChartError::Malformed(e.to_string()))
    }

    /// Builds the quote for `ticker` from the first chart result.
    pub fn into_quote(self, ticker: &str) -> Result<StockQuote, ChartError> {
        if let Some(error) = self.chart.error {
            return Err(ChartError::Upstream {
                code: error.code,
                description: error.description,
            });
        }

        let data = self
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ChartError::Malformed("chart.result is empty".into()))?;

        let (price, epoch_seconds) = match data.latest_close()? {
            Some(close) => close,
            None => data.regular_market()?,
        };

        StockQuote::new(ticker, price, data.meta.currency, epoch_seconds)
            .map_err(|e| ChartError::Malformed(e.to_string()))
    }
}

impl ChartData {
    /// Most recent non-null close, found by scanning the series backwards by index.
    pub fn latest_close(&self) -> Result<Option<(f64, i64)>, ChartError> {
        let closes = self
            .indicators
            .quote
            .first()
            .map(|series| series.close.as_slice())
            .unwrap_or_default();
        let timestamps = self.timestamp.as_deref().unwrap_or_default();

        for (index, close) in closes.iter().enumerate().rev() {
            if let Some(price) = close {
                let epoch_seconds = timestamps.get(index).copied().ok_or_else(|| {
                    ChartError::Malformed(format!("no timestamp for close at index {index}"))
                })?;

                return Ok(Some((*price, epoch_seconds)));
            }
        }

        Ok(None)
    }

    fn regular_market(&self) -> Result<(f64, i64), ChartError> {
        let price = self
            .meta
            .regular_market_price
            .ok_or_else(|| ChartError::Malformed("meta.regularMarketPrice missing".into()))?;
        let epoch_seconds = self
            .meta
            .regular_market_time
            .ok_or_else(|| ChartError::Malformed("meta.regularMarketTime missing".into()))?;

        Ok((price, epoch_seconds))
    }
}
