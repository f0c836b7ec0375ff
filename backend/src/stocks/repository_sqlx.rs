use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::model::{NewStock, Stock, normalize_symbol};
use super::repository::StockRepository;
use crate::db::convert::{flag_col, i64_to_u64, u64_to_i64, uuid_col};
use crate::error::ValidationError;
use crate::time::{from_ms, to_ms};

/// SQLx-backed implementation of StockRepository.
pub struct SqlxStockRepository {
    pool: AnyPool,
}

impl SqlxStockRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_STOCK: &str = r#"
SELECT stock_id, symbol, name, exchange, currency, sector, industry, market_cap,
       is_active, created_ms, updated_ms
FROM stocks"#;

#[async_trait]
impl StockRepository for SqlxStockRepository {
    #[instrument(skip(self, new), target = "stocks", fields(symbol = %new.symbol))]
    async fn create(&self, new: NewStock, now: DateTime<Utc>) -> anyhow::Result<Stock> {
        let symbol = normalize_symbol(&new.symbol);
        if self.fetch_by_symbol(&symbol).await?.is_some() {
            return Err(ValidationError::DuplicateSymbol(symbol).into());
        }

        let now = from_ms(to_ms(now))?;
        let stock = Stock {
            id: Uuid::new_v4(),
            symbol,
            name: new.name,
            exchange: new.exchange,
            currency: new.currency,
            sector: new.sector,
            industry: new.industry,
            market_cap: new.market_cap,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let market_cap = stock.market_cap.map(u64_to_i64).transpose()?;

        sqlx::query(
            r#"
INSERT INTO stocks
  (stock_id, symbol, name, exchange, currency, sector, industry, market_cap,
   is_active, created_ms, updated_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?);
"#,
        )
        .bind(stock.id.to_string())
        .bind(stock.symbol.clone())
        .bind(stock.name.clone())
        .bind(stock.exchange.clone())
        .bind(stock.currency.clone())
        .bind(stock.sector.clone())
        .bind(stock.industry.clone())
        .bind(market_cap)
        .bind(to_ms(now))
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .context("insert stock")?;

        info!(stock_id = %stock.id, "stock created");
        Ok(stock)
    }

    async fn fetch_by_id(&self, stock_id: &Uuid) -> anyhow::Result<Option<Stock>> {
        let row = sqlx::query(&format!("{SELECT_STOCK} WHERE stock_id = ?;"))
            .bind(stock_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_stock).transpose()
    }

    async fn fetch_by_symbol(&self, symbol: &str) -> anyhow::Result<Option<Stock>> {
        let row = sqlx::query(&format!("{SELECT_STOCK} WHERE symbol = ?;"))
            .bind(normalize_symbol(symbol))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_stock).transpose()
    }

    async fn list_active(&self) -> anyhow::Result<Vec<Stock>> {
        let rows = sqlx::query(&format!("{SELECT_STOCK} WHERE is_active = 1 ORDER BY symbol;"))
            .fetch_all(&self.pool)
            .await?;

        Ok(collect_rows(&rows))
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Stock>> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        let rows = sqlx::query(&format!(
            "{SELECT_STOCK} WHERE is_active = 1 AND (LOWER(symbol) LIKE ? OR LOWER(name) LIKE ?) ORDER BY symbol;"
        ))
        .bind(pattern.clone())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(collect_rows(&rows))
    }

    async fn soft_delete(&self, stock_id: &Uuid, now: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE stocks SET is_active = 0, updated_ms = ? WHERE stock_id = ?;")
            .bind(to_ms(now))
            .bind(stock_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn collect_rows(rows: &[sqlx::any::AnyRow]) -> Vec<Stock> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_stock(r) {
            Ok(s) => out.push(s),
            // poison-row resilience: one bad row must not hide the rest
            Err(e) => warn!(error = %e, "skipping malformed stock row"),
        }
    }
    out
}

pub(crate) fn row_to_stock(r: &sqlx::any::AnyRow) -> anyhow::Result<Stock> {
    let market_cap: Option<i64> = r.try_get("market_cap")?;
    Ok(Stock {
        id: uuid_col(r, "stock_id")?,
        symbol: r.try_get("symbol")?,
        name: r.try_get("name")?,
        exchange: r.try_get("exchange")?,
        currency: r.try_get("currency")?,
        sector: r.try_get("sector")?,
        industry: r.try_get("industry")?,
        market_cap: market_cap.map(i64_to_u64).transpose()?,
        is_active: flag_col(r, "is_active")?,
        created_at: from_ms(r.try_get("created_ms")?)?,
        updated_at: from_ms(r.try_get("updated_ms")?)?,
    })
}
