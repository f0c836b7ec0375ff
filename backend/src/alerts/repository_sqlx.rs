use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::{Alert, AlertContext, NewAlert};
use super::repository::AlertRepository;
use crate::db::convert::{decimal_col, enum_col, flag, flag_col, uuid_col};
use crate::error::ValidationError;
use crate::notifications::NotificationRecord;
use crate::notifications::repository_sqlx::insert_notification;
use crate::time::{from_ms, opt_from_ms, to_ms};

pub struct SqlxAlertRepository {
    pool: AnyPool,
}

impl SqlxAlertRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_ALERT: &str = r#"
SELECT a.alert_id, a.user_id, a.stock_id, a.condition_type, a.threshold, a.one_time,
       a.is_active, a.triggered_ms, a.last_checked_ms, a.created_ms, a.updated_ms
FROM alerts a"#;

const SELECT_CONTEXT: &str = r#"
SELECT a.alert_id, a.user_id, a.stock_id, a.condition_type, a.threshold, a.one_time,
       a.is_active, a.triggered_ms, a.last_checked_ms, a.created_ms, a.updated_ms,
       s.symbol, s.name AS stock_name, u.email
FROM alerts a
JOIN stocks s ON s.stock_id = a.stock_id
JOIN users u ON u.user_id = a.user_id"#;

#[async_trait]
impl AlertRepository for SqlxAlertRepository {
    #[instrument(skip(self, new), target = "alerts", fields(stock_id = %new.stock_id))]
    async fn create(&self, new: NewAlert, now: DateTime<Utc>) -> anyhow::Result<Alert> {
        new.validate()?;

        let active: Option<i64> = sqlx::query_scalar("SELECT is_active FROM stocks WHERE stock_id = ?;")
            .bind(new.stock_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if active != Some(1) {
            return Err(ValidationError::UnknownStock(new.stock_id.to_string()).into());
        }

        let now = from_ms(to_ms(now))?;
        let alert = Alert {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            stock_id: new.stock_id,
            condition: new.condition,
            threshold: new.threshold,
            one_time: new.one_time,
            is_active: true,
            triggered_at: None,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
INSERT INTO alerts
  (alert_id, user_id, stock_id, condition_type, threshold, one_time, is_active,
   triggered_ms, last_checked_ms, created_ms, updated_ms)
VALUES (?, ?, ?, ?, ?, ?, 1, NULL, NULL, ?, ?);
"#,
        )
        .bind(alert.id.to_string())
        .bind(alert.user_id.to_string())
        .bind(alert.stock_id.to_string())
        .bind(alert.condition.as_str())
        .bind(alert.threshold.to_string())
        .bind(flag(alert.one_time))
        .bind(to_ms(now))
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .context("insert alert")?;

        info!(alert_id = %alert.id, condition = %alert.condition, threshold = %alert.threshold, "alert created");
        Ok(alert)
    }

    async fn fetch_by_id(&self, alert_id: &Uuid) -> anyhow::Result<Option<Alert>> {
        let row = sqlx::query(&format!("{SELECT_ALERT} WHERE a.alert_id = ?;"))
            .bind(alert_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_alert).transpose()
    }

    async fn fetch_context(&self, alert_id: &Uuid) -> anyhow::Result<Option<AlertContext>> {
        let row = sqlx::query(&format!("{SELECT_CONTEXT} WHERE a.alert_id = ?;"))
            .bind(alert_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_context).transpose()
    }

    async fn list_pending(&self) -> anyhow::Result<Vec<AlertContext>> {
        let rows = sqlx::query(&format!(
            "{SELECT_CONTEXT} WHERE a.is_active = 1 AND a.triggered_ms IS NULL ORDER BY a.created_ms;"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            match row_to_context(r) {
                Ok(c) => out.push(c),
                // poison-row resilience: one bad row must not hide the rest
                Err(e) => warn!(error = %e, "skipping malformed alert row"),
            }
        }
        Ok(out)
    }

    async fn list_for_user(&self, user_id: &Uuid) -> anyhow::Result<Vec<Alert>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ALERT} WHERE a.user_id = ? ORDER BY a.created_ms DESC;"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            match row_to_alert(r) {
                Ok(a) => out.push(a),
                Err(e) => warn!(error = %e, "skipping malformed alert row"),
            }
        }
        Ok(out)
    }

    async fn touch_checked(&self, alert_id: &Uuid, now: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE alerts SET last_checked_ms = ? WHERE alert_id = ?;")
            .bind(to_ms(now))
            .bind(alert_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, notification), target = "alerts")]
    async fn mark_triggered(
        &self,
        alert_id: &Uuid,
        now: DateTime<Utc>,
        notification: &NotificationRecord,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            r#"
UPDATE alerts
SET triggered_ms = ?,
    last_checked_ms = ?,
    updated_ms = ?,
    is_active = CASE WHEN one_time = 1 THEN 0 ELSE is_active END
WHERE alert_id = ? AND triggered_ms IS NULL;
"#,
        )
        .bind(to_ms(now))
        .bind(to_ms(now))
        .bind(to_ms(now))
        .bind(alert_id.to_string())
        .execute(&mut *tx)
        .await
        .context("mark alert triggered")?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("alert already triggered by another run");
            return Ok(false);
        }

        insert_notification(&mut *tx, notification).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn set_active(&self, alert_id: &Uuid, active: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
        let sql = if active {
            "UPDATE alerts SET is_active = ?, triggered_ms = NULL, updated_ms = ? WHERE alert_id = ?;"
        } else {
            "UPDATE alerts SET is_active = ?, updated_ms = ? WHERE alert_id = ?;"
        };
        sqlx::query(sql)
            .bind(flag(active))
            .bind(to_ms(now))
            .bind(alert_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), target = "alerts")]
    async fn delete(&self, alert_id: &Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE notifications SET alert_id = NULL WHERE alert_id = ?;")
            .bind(alert_id.to_string())
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM alerts WHERE alert_id = ?;")
            .bind(alert_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() == 1)
    }
}

fn row_to_alert(r: &sqlx::any::AnyRow) -> anyhow::Result<Alert> {
    Ok(Alert {
        id: uuid_col(r, "alert_id")?,
        user_id: uuid_col(r, "user_id")?,
        stock_id: uuid_col(r, "stock_id")?,
        condition: enum_col(r, "condition_type")?,
        threshold: decimal_col(r, "threshold")?,
        one_time: flag_col(r, "one_time")?,
        is_active: flag_col(r, "is_active")?,
        triggered_at: opt_from_ms(r.try_get("triggered_ms")?)?,
        last_checked_at: opt_from_ms(r.try_get("last_checked_ms")?)?,
        created_at: from_ms(r.try_get("created_ms")?)?,
        updated_at: from_ms(r.try_get("updated_ms")?)?,
    })
}

fn row_to_context(r: &sqlx::any::AnyRow) -> anyhow::Result<AlertContext> {
    Ok(AlertContext {
        alert: row_to_alert(r)?,
        symbol: r.try_get("symbol")?,
        stock_name: r.try_get("stock_name")?,
        user_email: r.try_get("email")?,
    })
}
