//! Periodic price ingestion.
//!
//! Data flow:
//! active stocks → quote provider → PriceStore (idempotent insert + cache
//! invalidation)
//!
//! One stock's failure never aborts the cycle. Only a failure to obtain the
//! work list itself fails the invocation, which the job runner then retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::model::{InsertOutcome, NewPrice, PriceSource};
use super::provider::{NoData, QuoteFetch, QuoteProvider};
use super::store::PriceStore;
use crate::jobs::Job;
use crate::metrics::Counters;
use crate::stocks::{Stock, StockRepository};
use crate::time;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub stocks: usize,
    pub written: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

enum StockOutcome {
    Written,
    Duplicate,
    Skipped,
}

pub struct PriceIngestionJob {
    stocks: Arc<dyn StockRepository>,
    provider: Arc<dyn QuoteProvider>,
    prices: Arc<PriceStore>,
    /// Width of the timestamp bucket quotes are stamped with.
    bucket: Duration,
    counters: Counters,
}

impl PriceIngestionJob {
    pub fn new(
        stocks: Arc<dyn StockRepository>,
        provider: Arc<dyn QuoteProvider>,
        prices: Arc<PriceStore>,
        bucket: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            stocks,
            provider,
            prices,
            bucket,
            counters,
        }
    }

    /// One ingestion cycle over every active stock.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<IngestSummary> {
        let stocks = self
            .stocks
            .list_active()
            .await
            .context("failed to list active stocks")?;

        info!(count = stocks.len(), "fetching prices for active stocks");

        let observed_at =
            time::bucket_start(now, self.bucket).context("failed to align ingestion timestamp")?;
        let mut summary = IngestSummary {
            stocks: stocks.len(),
            ..IngestSummary::default()
        };

        for stock in &stocks {
            let span = info_span!("ingest_stock", stock = %stock.symbol);
            match self.ingest_one(stock, observed_at, now).instrument(span).await {
                Ok(StockOutcome::Written) => summary.written += 1,
                Ok(StockOutcome::Duplicate) => summary.duplicates += 1,
                Ok(StockOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.skipped += 1;
                    Counters::incr(&self.counters.quote_failures);
                    error!(stock = %stock.symbol, error = ?e, "price ingestion failed for stock; continuing");
                }
            }
        }

        info!(
            stocks = summary.stocks,
            written = summary.written,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "price ingestion cycle complete"
        );
        Ok(summary)
    }

    async fn ingest_one(
        &self,
        stock: &Stock,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<StockOutcome> {
        let quote = match self.provider.fetch_quote(&stock.symbol).await? {
            QuoteFetch::Quote(q) => q,
            QuoteFetch::NoData(reason) => {
                Counters::incr(&self.counters.quotes_empty);
                match reason {
                    NoData::ProviderError(msg) => {
                        error!(stock = %stock.symbol, message = %msg, "provider error; no data this cycle")
                    }
                    NoData::RateLimited(msg) => {
                        warn!(stock = %stock.symbol, message = %msg, "provider rate limit; no data this cycle")
                    }
                    NoData::Empty => warn!(stock = %stock.symbol, "provider returned no quote"),
                }
                return Ok(StockOutcome::Skipped);
            }
        };

        let new = NewPrice {
            stock_id: stock.id,
            price: quote.price,
            volume: i64::try_from(quote.volume).context("volume out of range")?,
            source: PriceSource::AlphaVantage,
            timestamp: observed_at,
        };

        match self.prices.record(&new, now).await? {
            InsertOutcome::Created(rec) => {
                Counters::incr(&self.counters.prices_written);
                info!(stock = %stock.symbol, price = %rec.price, volume = rec.volume, "price recorded");
                Ok(StockOutcome::Written)
            }
            InsertOutcome::Duplicate => {
                Counters::incr(&self.counters.prices_duplicate);
                debug!(stock = %stock.symbol, "price for this window already recorded");
                Ok(StockOutcome::Duplicate)
            }
        }
    }
}

#[async_trait]
impl Job for PriceIngestionJob {
    fn name(&self) -> &'static str {
        "price_ingestion"
    }

    async fn run(&self) -> Result<()> {
        self.run_once(time::now()).await.map(|_| ())
    }
}
