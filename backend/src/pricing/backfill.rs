use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, instrument};

use super::model::{NewPrice, PriceSource};
use super::provider::QuoteProvider;
use super::store::PriceStore;
use crate::stocks::StockRepository;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub fetched: usize,
    pub created: usize,
}

/// On-demand import of daily closes for one stock.
///
/// Each bar is stored at midnight UTC of its date through the same
/// idempotent insert as live ingestion, so a retried or repeated backfill
/// only fills gaps.
pub struct HistoricalBackfill {
    stocks: Arc<dyn StockRepository>,
    provider: Arc<dyn QuoteProvider>,
    prices: Arc<PriceStore>,
}

impl HistoricalBackfill {
    pub fn new(
        stocks: Arc<dyn StockRepository>,
        provider: Arc<dyn QuoteProvider>,
        prices: Arc<PriceStore>,
    ) -> Self {
        Self {
            stocks,
            provider,
            prices,
        }
    }

    #[instrument(skip(self), target = "backfill")]
    pub async fn backfill(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<BackfillSummary> {
        let stock = self
            .stocks
            .fetch_by_symbol(symbol)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| anyhow!("no active stock with symbol {symbol}"))?;

        let bars = self
            .provider
            .fetch_daily_series(&stock.symbol, from, to)
            .await
            .with_context(|| format!("daily series fetch failed for {symbol}"))?;

        let mut summary = BackfillSummary {
            fetched: bars.len(),
            created: 0,
        };

        for bar in bars {
            let new = NewPrice {
                stock_id: stock.id,
                price: bar.close,
                volume: i64::try_from(bar.volume).context("volume out of range")?,
                source: PriceSource::AlphaVantage,
                timestamp: bar.date.and_time(chrono::NaiveTime::MIN).and_utc(),
            };
            if self.prices.record(&new, now).await?.is_created() {
                summary.created += 1;
            }
        }

        info!(
            symbol = %stock.symbol,
            fetched = summary.fetched,
            created = summary.created,
            "historical prices imported"
        );
        Ok(summary)
    }
}
