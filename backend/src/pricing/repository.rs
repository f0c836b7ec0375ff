use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{InsertOutcome, NewPrice, PriceRecord};

/// Append-only price series storage. There is deliberately no update path.
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// Inserts unless a record for (stock_id, timestamp) already exists.
    async fn insert_if_absent(&self, new: &NewPrice, now: DateTime<Utc>) -> Result<InsertOutcome>;

    /// Most recent record by timestamp.
    async fn latest(&self, stock_id: &Uuid) -> Result<Option<PriceRecord>>;

    /// Most recent record with timestamp <= `at`.
    async fn at_or_before(&self, stock_id: &Uuid, at: DateTime<Utc>) -> Result<Option<PriceRecord>>;

    /// Records in `[from, to]`, ascending by timestamp.
    async fn range(
        &self,
        stock_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>>;

    /// Deletes records with timestamp < `cutoff`; returns how many.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
