use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::model::{NewStock, Stock, validate_history_days};
use super::repository::StockRepository;
use crate::accounts::Actor;
use crate::accounts::permissions::{ensure_history_access, ensure_master_data_write};
use crate::pricing::{InsertOutcome, PriceRecord, PriceStatistics, PriceStore};
use crate::time;

/// Stock master data and price history, gated by the caller's role.
pub struct StockCatalog {
    stocks: Arc<dyn StockRepository>,
    prices: Arc<PriceStore>,
}

impl StockCatalog {
    pub fn new(stocks: Arc<dyn StockRepository>, prices: Arc<PriceStore>) -> Self {
        Self { stocks, prices }
    }

    pub async fn create(&self, actor: &Actor, new: NewStock, now: DateTime<Utc>) -> Result<Stock> {
        ensure_master_data_write(actor)?;
        self.stocks.create(new, now).await
    }

    pub async fn deactivate(&self, actor: &Actor, stock_id: &Uuid, now: DateTime<Utc>) -> Result<()> {
        ensure_master_data_write(actor)?;
        self.stocks.soft_delete(stock_id, now).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Stock>> {
        self.stocks.search(query).await
    }

    pub async fn by_symbol(&self, symbol: &str) -> Result<Option<Stock>> {
        self.stocks.fetch_by_symbol(symbol).await
    }

    /// Admin-only manual price entry.
    pub async fn record_price(
        &self,
        actor: &Actor,
        stock_id: Uuid,
        price: Decimal,
        volume: i64,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        ensure_master_data_write(actor)?;
        self.active(&stock_id).await?;
        self.prices.record_manual(stock_id, price, volume, timestamp, now).await
    }

    /// The last `days` of prices, ascending. Standard accounts are limited
    /// to a shorter window than premium ones.
    pub async fn history(
        &self,
        actor: &Actor,
        stock_id: &Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        validate_history_days(days)?;
        ensure_history_access(actor, days)?;
        self.active(stock_id).await?;
        self.prices.price_range(stock_id, time::days_before(now, days)?, now).await
    }

    pub async fn statistics(
        &self,
        actor: &Actor,
        stock_id: &Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<PriceStatistics>> {
        validate_history_days(days)?;
        ensure_history_access(actor, days)?;
        self.prices.statistics(stock_id, time::days_before(now, days)?, now).await
    }

    async fn active(&self, stock_id: &Uuid) -> Result<Stock> {
        self.stocks
            .fetch_by_id(stock_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| anyhow!("no active stock with id {stock_id}"))
    }
}
