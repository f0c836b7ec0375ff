use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::{InsertOutcome, NewPrice, PriceRecord, PriceSource, PriceStatistics};
use super::repository::PriceRepository;
use crate::cache::Cache;
use crate::time;
use common::warn_if_slow;

/// Read/write facade over the price series with a cached "latest price".
///
/// Writes that create a record invalidate the stock's cache entry before
/// returning, so a reader never sees a cached value older than the newest
/// committed write. Reads tolerate up to `latest_ttl` of staleness only
/// relative to writes made by other processes sharing the cache.
pub struct PriceStore {
    repo: Arc<dyn PriceRepository>,
    cache: Arc<dyn Cache>,
    latest_ttl: Duration,
}

pub fn latest_price_key(stock_id: &Uuid) -> String {
    format!("latest_price:{stock_id}")
}

impl PriceStore {
    pub fn new(repo: Arc<dyn PriceRepository>, cache: Arc<dyn Cache>, latest_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            latest_ttl,
        }
    }

    /// Idempotent write keyed on (stock, timestamp).
    #[instrument(skip(self, new), target = "store", fields(stock_id = %new.stock_id, source = %new.source))]
    pub async fn record(&self, new: &NewPrice, now: DateTime<Utc>) -> Result<InsertOutcome> {
        let outcome = warn_if_slow("db_insert_price", Duration::from_millis(100), async {
            self.repo.insert_if_absent(new, now).await
        })
        .await
        .context("failed to record price")?;

        if outcome.is_created() {
            self.cache.delete(&latest_price_key(&new.stock_id)).await;
            debug!("latest price cache invalidated");
        }

        Ok(outcome)
    }

    pub async fn record_manual(
        &self,
        stock_id: Uuid,
        price: Decimal,
        volume: i64,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let new = NewPrice {
            stock_id,
            price,
            volume,
            source: PriceSource::Manual,
            timestamp,
        };
        let outcome = self.record(&new, now).await?;
        info!(%stock_id, %price, created = outcome.is_created(), "manual price entry");
        Ok(outcome)
    }

    /// Cache-first lookup of the most recent record for `stock_id`.
    #[instrument(skip(self), target = "store", fields(stock_id = %stock_id))]
    pub async fn latest_price(&self, stock_id: &Uuid) -> Result<Option<PriceRecord>> {
        let key = latest_price_key(stock_id);

        if let Some(raw) = self.cache.get(&key).await {
            match serde_json::from_str::<PriceRecord>(&raw) {
                Ok(p) => return Ok(Some(p)),
                Err(e) => {
                    warn!(error = %e, "discarding undecodable cache entry");
                    self.cache.delete(&key).await;
                }
            }
        }

        let latest = warn_if_slow("db_latest_price", Duration::from_millis(100), async {
            self.repo.latest(stock_id).await
        })
        .await
        .context("failed to load latest price")?;

        if let Some(p) = &latest {
            match serde_json::to_string(p) {
                Ok(raw) => self.cache.set(&key, raw, self.latest_ttl).await,
                Err(e) => warn!(error = %e, "latest price not cached"),
            }
        }

        Ok(latest)
    }

    pub async fn price_at_or_before(
        &self,
        stock_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<PriceRecord>> {
        self.repo.at_or_before(stock_id, at).await
    }

    pub async fn price_range(
        &self,
        stock_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        self.repo.range(stock_id, from, to).await
    }

    pub async fn statistics(
        &self,
        stock_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<PriceStatistics>> {
        let series = self.price_range(stock_id, from, to).await?;
        PriceStatistics::from_records(&series).with_context(|| format!("statistics for stock {stock_id}"))
    }

    /// Retention sweep: removes records older than `retention_days`.
    #[instrument(skip(self), target = "store")]
    pub async fn cleanup_older_than(&self, now: DateTime<Utc>, retention_days: i64) -> Result<u64> {
        let cutoff = time::days_before(now, retention_days)?;
        let deleted = self.repo.delete_older_than(cutoff).await?;
        info!(deleted, %cutoff, "cleaned up old price records");
        Ok(deleted)
    }
}
