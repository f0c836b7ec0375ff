use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{AnyPool, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::model::{Watchlist, WatchlistItem, normalize_name};
use super::repository::WatchlistRepository;
use crate::db::convert::{flag, flag_col, uuid_col};
use crate::error::{AccessError, ValidationError};
use crate::stocks::Stock;
use crate::stocks::repository_sqlx::row_to_stock;
use crate::time::{from_ms, to_ms};

pub struct SqlxWatchlistRepository {
    pool: AnyPool,
}

impl SqlxWatchlistRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_WATCHLIST: &str = r#"
SELECT watchlist_id, user_id, name, is_default, created_ms, updated_ms
FROM watchlists"#;

#[async_trait]
impl WatchlistRepository for SqlxWatchlistRepository {
    #[instrument(skip(self, admit), target = "watchlists")]
    async fn create(
        &self,
        user_id: &Uuid,
        name: &str,
        admit: &(dyn Fn(u32) -> Result<(), AccessError> + Sync),
        now: DateTime<Utc>,
    ) -> anyhow::Result<Watchlist> {
        let name = normalize_name(name)?;
        let mut tx = self.pool.begin().await?;

        let same_name: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM watchlists WHERE user_id = ? AND name = ?;")
                .bind(user_id.to_string())
                .bind(name.clone())
                .fetch_one(&mut *tx)
                .await?;
        if same_name > 0 {
            return Err(ValidationError::DuplicateWatchlist(name).into());
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watchlists WHERE user_id = ?;")
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let existing =
            u32::try_from(existing).map_err(|_| anyhow!("watchlist count out of range: {existing}"))?;
        admit(existing)?;

        let now = from_ms(to_ms(now))?;
        let wl = Watchlist {
            id: Uuid::new_v4(),
            user_id: *user_id,
            name,
            is_default: existing == 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
INSERT INTO watchlists (watchlist_id, user_id, name, is_default, created_ms, updated_ms)
VALUES (?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(wl.id.to_string())
        .bind(wl.user_id.to_string())
        .bind(wl.name.clone())
        .bind(flag(wl.is_default))
        .bind(to_ms(now))
        .bind(to_ms(now))
        .execute(&mut *tx)
        .await
        .context("insert watchlist")?;

        tx.commit().await?;

        info!(watchlist_id = %wl.id, is_default = wl.is_default, "watchlist created");
        Ok(wl)
    }

    async fn fetch_by_id(&self, watchlist_id: &Uuid) -> anyhow::Result<Option<Watchlist>> {
        let row = sqlx::query(&format!("{SELECT_WATCHLIST} WHERE watchlist_id = ?;"))
            .bind(watchlist_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_watchlist).transpose()
    }

    async fn list_for_user(&self, user_id: &Uuid) -> anyhow::Result<Vec<Watchlist>> {
        let rows = sqlx::query(&format!(
            "{SELECT_WATCHLIST} WHERE user_id = ? ORDER BY is_default DESC, name;"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            match row_to_watchlist(r) {
                Ok(w) => out.push(w),
                Err(e) => warn!(error = %e, "skipping malformed watchlist row"),
            }
        }
        Ok(out)
    }

    #[instrument(skip(self), target = "watchlists")]
    async fn set_default(&self, watchlist_id: &Uuid, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM watchlists WHERE watchlist_id = ?;")
                .bind(watchlist_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let owner = owner.ok_or_else(|| anyhow!("watchlist {watchlist_id} not found"))?;

        sqlx::query(
            "UPDATE watchlists SET is_default = 0, updated_ms = ? WHERE user_id = ? AND is_default = 1;",
        )
        .bind(to_ms(now))
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE watchlists SET is_default = 1, updated_ms = ? WHERE watchlist_id = ?;")
            .bind(to_ms(now))
            .bind(watchlist_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, watchlist_id: &Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM watchlist_items WHERE watchlist_id = ?;")
            .bind(watchlist_id.to_string())
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM watchlists WHERE watchlist_id = ?;")
            .bind(watchlist_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() == 1)
    }

    #[instrument(skip(self, alert_thresholds), target = "watchlists")]
    async fn add_item(
        &self,
        watchlist_id: &Uuid,
        stock_id: &Uuid,
        alert_thresholds: Value,
        now: DateTime<Utc>,
    ) -> anyhow::Result<WatchlistItem> {
        let active: Option<i64> = sqlx::query_scalar("SELECT is_active FROM stocks WHERE stock_id = ?;")
            .bind(stock_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if active != Some(1) {
            return Err(ValidationError::UnknownStock(stock_id.to_string()).into());
        }

        let now = from_ms(to_ms(now))?;
        let item = WatchlistItem {
            id: Uuid::new_v4(),
            watchlist_id: *watchlist_id,
            stock_id: *stock_id,
            alert_thresholds,
            added_at: now,
        };

        let res = sqlx::query(
            r#"
INSERT INTO watchlist_items (item_id, watchlist_id, stock_id, alert_thresholds, added_ms)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (watchlist_id, stock_id) DO NOTHING;
"#,
        )
        .bind(item.id.to_string())
        .bind(watchlist_id.to_string())
        .bind(stock_id.to_string())
        .bind(item.alert_thresholds.to_string())
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .context("insert watchlist item")?;

        if res.rows_affected() == 0 {
            return Err(ValidationError::DuplicateWatchlistItem.into());
        }
        Ok(item)
    }

    async fn remove_item(&self, watchlist_id: &Uuid, stock_id: &Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM watchlist_items WHERE watchlist_id = ? AND stock_id = ?;")
            .bind(watchlist_id.to_string())
            .bind(stock_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn list_items(&self, watchlist_id: &Uuid) -> anyhow::Result<Vec<(WatchlistItem, Stock)>> {
        let rows = sqlx::query(
            r#"
SELECT i.item_id, i.watchlist_id, i.alert_thresholds, i.added_ms,
       s.stock_id, s.symbol, s.name, s.exchange, s.currency, s.sector, s.industry,
       s.market_cap, s.is_active, s.created_ms, s.updated_ms
FROM watchlist_items i
JOIN stocks s ON s.stock_id = i.stock_id
WHERE i.watchlist_id = ?
ORDER BY s.symbol;
"#,
        )
        .bind(watchlist_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            match row_to_item(r).and_then(|item| Ok((item, row_to_stock(r)?))) {
                Ok(pair) => out.push(pair),
                Err(e) => warn!(error = %e, "skipping malformed watchlist item row"),
            }
        }
        Ok(out)
    }
}

fn row_to_watchlist(r: &sqlx::any::AnyRow) -> anyhow::Result<Watchlist> {
    Ok(Watchlist {
        id: uuid_col(r, "watchlist_id")?,
        user_id: uuid_col(r, "user_id")?,
        name: r.try_get("name")?,
        is_default: flag_col(r, "is_default")?,
        created_at: from_ms(r.try_get("created_ms")?)?,
        updated_at: from_ms(r.try_get("updated_ms")?)?,
    })
}

fn row_to_item(r: &sqlx::any::AnyRow) -> anyhow::Result<WatchlistItem> {
    let raw: String = r.try_get("alert_thresholds")?;
    Ok(WatchlistItem {
        id: uuid_col(r, "item_id")?,
        watchlist_id: uuid_col(r, "watchlist_id")?,
        stock_id: uuid_col(r, "stock_id")?,
        alert_thresholds: serde_json::from_str(&raw).context("invalid alert_thresholds json")?,
        added_at: from_ms(r.try_get("added_ms")?)?,
    })
}
