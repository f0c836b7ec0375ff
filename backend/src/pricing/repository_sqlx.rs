use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::model::{InsertOutcome, NewPrice, PriceRecord};
use super::repository::PriceRepository;
use crate::db::convert::{decimal_col, enum_col, i64_to_u64, uuid_col};
use crate::time::{from_ms, to_ms};

/// SQLx-backed implementation of PriceRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxPriceRepository {
    pool: AnyPool,
}

impl SqlxPriceRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_PRICE: &str = r#"
SELECT price_id, stock_id, price, volume, source, ts_ms, created_ms
FROM stock_prices"#;

#[async_trait]
impl PriceRepository for SqlxPriceRepository {
    #[instrument(skip(self, new), target = "pricing", fields(stock_id = %new.stock_id))]
    async fn insert_if_absent(
        &self,
        new: &NewPrice,
        now: DateTime<Utc>,
    ) -> anyhow::Result<InsertOutcome> {
        new.validate()?;

        let id = Uuid::new_v4();
        let ts_ms = to_ms(new.timestamp);
        let created_ms = to_ms(now);

        // The (stock_id, ts_ms) unique constraint makes this race-free across
        // overlapping ingestion runs.
        let res = sqlx::query(
            r#"
INSERT INTO stock_prices (price_id, stock_id, price, volume, source, ts_ms, created_ms)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (stock_id, ts_ms) DO NOTHING;
"#,
        )
        .bind(id.to_string())
        .bind(new.stock_id.to_string())
        .bind(new.price.to_string())
        .bind(new.volume)
        .bind(new.source.as_str())
        .bind(ts_ms)
        .bind(created_ms)
        .execute(&self.pool)
        .await
        .context("insert stock price")?;

        if res.rows_affected() == 0 {
            debug!(ts_ms, "price already recorded for timestamp");
            return Ok(InsertOutcome::Duplicate);
        }

        Ok(InsertOutcome::Created(PriceRecord {
            id,
            stock_id: new.stock_id,
            price: new.price,
            volume: i64_to_u64(new.volume)?,
            source: new.source,
            timestamp: from_ms(ts_ms)?,
            created_at: from_ms(created_ms)?,
        }))
    }

    async fn latest(&self, stock_id: &Uuid) -> anyhow::Result<Option<PriceRecord>> {
        let row = sqlx::query(&format!(
            "{SELECT_PRICE} WHERE stock_id = ? ORDER BY ts_ms DESC LIMIT 1;"
        ))
        .bind(stock_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_price).transpose()
    }

    async fn at_or_before(
        &self,
        stock_id: &Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<PriceRecord>> {
        let row = sqlx::query(&format!(
            "{SELECT_PRICE} WHERE stock_id = ? AND ts_ms <= ? ORDER BY ts_ms DESC LIMIT 1;"
        ))
        .bind(stock_id.to_string())
        .bind(to_ms(at))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_price).transpose()
    }

    async fn range(
        &self,
        stock_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_PRICE} WHERE stock_id = ? AND ts_ms >= ? AND ts_ms <= ? ORDER BY ts_ms ASC;"
        ))
        .bind(stock_id.to_string())
        .bind(to_ms(from))
        .bind(to_ms(to))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_price(&r) {
                Ok(p) => out.push(p),
                Err(e) => warn!(error = %e, "skipping malformed price row"),
            }
        }
        Ok(out)
    }

    #[instrument(skip(self), target = "pricing")]
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM stock_prices WHERE ts_ms < ?;")
            .bind(to_ms(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

fn row_to_price(r: &sqlx::any::AnyRow) -> anyhow::Result<PriceRecord> {
    Ok(PriceRecord {
        id: uuid_col(r, "price_id")?,
        stock_id: uuid_col(r, "stock_id")?,
        price: decimal_col(r, "price")?,
        volume: i64_to_u64(r.try_get("volume")?)?,
        source: enum_col(r, "source")?,
        timestamp: from_ms(r.try_get("ts_ms")?)?,
        created_at: from_ms(r.try_get("created_ms")?)?,
    })
}
