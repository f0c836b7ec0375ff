//! Market-data quote provider.

pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;

pub use client::AlphaVantageClient;
pub use errors::QuoteError;
pub use types::{DailyBar, NoData, Quote, QuoteFetch};

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Current quote for `symbol`. Provider-side notices (errors, rate limits)
    /// come back as `QuoteFetch::NoData`, not as `Err`.
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteFetch, QuoteError>;

    /// Daily closes for `symbol` within `[from, to]` (inclusive).
    async fn fetch_daily_series(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, QuoteError>;
}
