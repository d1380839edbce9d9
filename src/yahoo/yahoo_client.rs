use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use url::Url;

use crate::config::pipeline_config::ChartConfig;
use crate::market::quote_source::{ChartError, QuoteSource};
use crate::types::stock_quote::StockQuote;
use crate::yahoo::chart_response::ChartResponse;

const CHART_PARAMS: &[(&str, &str)] = &[
    ("interval", "1m"),
    ("range", "1d"),
    ("includePrePost", "true"),
    ("useYfid", "true"),
    ("includePreviousClose", "true"),
];

#[derive(Clone, Debug)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: Url,
}

impl YahooChartClient {
    pub fn new(config: &ChartConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build chart http client")?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid chart base url {}", config.base_url))?;

        Ok(Self { http, base_url })
    }

    pub fn chart_url(&self, ticker: &str) -> Result<Url> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| anyhow!("chart base url cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .push(ticker);

        url.query_pairs_mut().extend_pairs(CHART_PARAMS);

        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for YahooChartClient {
    async fn latest_quote(&self, ticker: &str) -> Result<StockQuote, ChartError> {
        let url = self
            .chart_url(ticker)
            .map_err(|e| ChartError::Transport(e.to_string()))?;

        tracing::debug!(%ticker, %url, "requesting chart");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChartError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ChartError::Transport(format!("read response body failed: {e}")))?;

        if !status.is_success() {
            return Err(ChartError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        ChartResponse::from_json(&text)?.into_quote(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> YahooChartClient {
        YahooChartClient::new(&ChartConfig {
            base_url: base_url.to_string(),
            ..ChartConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn chart_url_carries_ticker_and_params() {
        let url = client("https://query1.finance.yahoo.com/v8/finance/chart")
            .chart_url("AAPL")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/AAPL\
             ?interval=1m&range=1d&includePrePost=true&useYfid=true&includePreviousClose=true"
        );
    }

    #[test]
    fn chart_url_ignores_trailing_slash() {
        let url = client("https://example.test/chart/").chart_url("MSFT").unwrap();

        assert_eq!(url.path(), "/chart/MSFT");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = YahooChartClient::new(&ChartConfig {
            base_url: "not a url".to_string(),
            ..ChartConfig::default()
        });

        assert!(result.is_err());
    }
}
