use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::QuoteProvider;
use super::errors::QuoteError;
use super::types::{DailyBar, QuoteFetch, parse_daily_series, parse_global_quote};

/// HTTP client for an Alpha Vantage compatible quote API.
#[derive(Clone)]
pub struct AlphaVantageClient {
    http: Client,
    base_url: String,
    api_key: String,
    quote_timeout: Duration,
    series_timeout: Duration,
}

impl AlphaVantageClient {
    pub fn new(
        base_url: String,
        api_key: String,
        quote_timeout: Duration,
        series_timeout: Duration,
    ) -> Result<Self, QuoteError> {
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            quote_timeout,
            series_timeout,
        })
    }

    async fn get_json(&self, params: &[(&str, &str)], timeout: Duration) -> Result<Value, QuoteError> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .timeout(timeout)
            .send()
            .await
            .map_err(QuoteError::from_reqwest)?
            .error_for_status()?;

        resp.json::<Value>().await.map_err(QuoteError::from_reqwest)
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteFetch, QuoteError> {
        let body = self
            .get_json(
                &[("function", "GLOBAL_QUOTE"), ("symbol", symbol)],
                self.quote_timeout,
            )
            .await?;

        let fetched = parse_global_quote(&body)?;
        debug!(?fetched, "quote fetched");
        Ok(fetched)
    }

    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    async fn fetch_daily_series(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, QuoteError> {
        let body = self
            .get_json(
                &[
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol),
                    ("outputsize", "full"),
                ],
                self.series_timeout,
            )
            .await?;

        let bars = parse_daily_series(&body, from, to)?;
        debug!(bars = bars.len(), "daily series fetched");
        Ok(bars)
    }
}
