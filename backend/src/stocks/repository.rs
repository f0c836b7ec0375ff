use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{NewStock, Stock};

#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn create(&self, new: NewStock, now: DateTime<Utc>) -> Result<Stock>;

    async fn fetch_by_id(&self, stock_id: &Uuid) -> Result<Option<Stock>>;

    async fn fetch_by_symbol(&self, symbol: &str) -> Result<Option<Stock>>;

    /// Active stocks ordered by symbol; this is the ingestion work list.
    async fn list_active(&self) -> Result<Vec<Stock>>;

    /// Case-insensitive match on symbol or name, active stocks only.
    async fn search(&self, query: &str) -> Result<Vec<Stock>>;

    async fn soft_delete(&self, stock_id: &Uuid, now: DateTime<Utc>) -> Result<()>;
}
