use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Executor, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::model::NotificationRecord;
use super::repository::{Addressed, NotificationRepository};
use crate::db::convert::{enum_col, opt_uuid_col, uuid_col};
use crate::time::{from_ms, opt_from_ms, to_ms};

pub struct SqlxNotificationRepository {
    pool: AnyPool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const SELECT_NOTIFICATION: &str = r#"
SELECT n.notification_id, n.user_id, n.alert_id, n.kind, n.channel, n.subject, n.body,
       n.status, n.sent_ms, n.error_message, n.read_ms, n.created_ms
FROM notifications n"#;

/// Inserts `n` on any executor, so the alert trigger can write its
/// notification inside its own transaction.
pub(crate) async fn insert_notification<'e, E>(exec: E, n: &NotificationRecord) -> anyhow::Result<()>
where
    E: Executor<'e, Database = Any>,
{
    sqlx::query(
        r#"
INSERT INTO notifications
  (notification_id, user_id, alert_id, kind, channel, subject, body, status,
   sent_ms, error_message, read_ms, created_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
    )
    .bind(n.id.to_string())
    .bind(n.user_id.to_string())
    .bind(n.alert_id.map(|id| id.to_string()))
    .bind(n.kind.as_str())
    .bind(n.channel.as_str())
    .bind(n.subject.clone())
    .bind(n.body.clone())
    .bind(n.status.as_str())
    .bind(n.sent_at.map(to_ms))
    .bind(n.error_message.clone())
    .bind(n.read_at.map(to_ms))
    .bind(to_ms(n.created_at))
    .execute(exec)
    .await
    .context("insert notification")?;
    Ok(())
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    #[instrument(skip(self, record), target = "notifications", fields(notification_id = %record.id))]
    async fn create(&self, record: &NotificationRecord) -> anyhow::Result<()> {
        insert_notification(&self.pool, record).await?;
        debug!(kind = %record.kind, "notification recorded");
        Ok(())
    }

    async fn fetch_by_id(&self, id: &Uuid) -> anyhow::Result<Option<NotificationRecord>> {
        let row = sqlx::query(&format!("{SELECT_NOTIFICATION} WHERE n.notification_id = ?;"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_notification).transpose()
    }

    async fn fetch_addressed(&self, id: &Uuid) -> anyhow::Result<Option<Addressed>> {
        let row = sqlx::query(
            r#"
SELECT n.notification_id, n.user_id, n.alert_id, n.kind, n.channel, n.subject, n.body,
       n.status, n.sent_ms, n.error_message, n.read_ms, n.created_ms, u.email
FROM notifications n
JOIN users u ON u.user_id = n.user_id
WHERE n.notification_id = ?;
"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        Ok(Some(Addressed {
            record: row_to_notification(&r)?,
            email: r.try_get("email")?,
        }))
    }

    async fn list_for_alert(&self, alert_id: &Uuid) -> anyhow::Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_NOTIFICATION} WHERE n.alert_id = ? ORDER BY n.created_ms DESC;"
        ))
        .bind(alert_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(collect_rows(&rows))
    }

    async fn list_for_user(&self, user_id: &Uuid) -> anyhow::Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_NOTIFICATION} WHERE n.user_id = ? ORDER BY n.created_ms DESC;"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(collect_rows(&rows))
    }

    async fn list_unread(&self, user_id: &Uuid) -> anyhow::Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_NOTIFICATION} WHERE n.user_id = ? AND n.read_ms IS NULL ORDER BY n.created_ms DESC;"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(collect_rows(&rows))
    }

    async fn mark_sent(&self, id: &Uuid, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE notifications SET status = 'SENT', sent_ms = ? WHERE notification_id = ? AND status = 'PENDING';",
        )
        .bind(to_ms(now))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: &Uuid, error: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE notifications SET status = 'FAILED', error_message = ? WHERE notification_id = ? AND status = 'PENDING';",
        )
        .bind(error.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_read(&self, id: &Uuid, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE notifications SET read_ms = ? WHERE notification_id = ? AND read_ms IS NULL;",
        )
        .bind(to_ms(now))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    #[instrument(skip(self), target = "notifications")]
    async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "DELETE FROM notifications WHERE read_ms IS NOT NULL AND read_ms < ?;",
        )
        .bind(to_ms(cutoff))
        .execute(&self.pool)
        .await?;

        let deleted = res.rows_affected();
        info!(deleted, "deleted old read notifications");
        Ok(deleted)
    }
}

fn collect_rows(rows: &[sqlx::any::AnyRow]) -> Vec<NotificationRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_notification(r) {
            Ok(n) => out.push(n),
            Err(e) => warn!(error = %e, "skipping malformed notification row"),
        }
    }
    out
}

fn row_to_notification(r: &sqlx::any::AnyRow) -> anyhow::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: uuid_col(r, "notification_id")?,
        user_id: uuid_col(r, "user_id")?,
        alert_id: opt_uuid_col(r, "alert_id")?,
        kind: enum_col(r, "kind")?,
        channel: enum_col(r, "channel")?,
        subject: r.try_get("subject")?,
        body: r.try_get("body")?,
        status: enum_col(r, "status")?,
        sent_at: opt_from_ms(r.try_get("sent_ms")?)?,
        error_message: r.try_get("error_message")?,
        read_at: opt_from_ms(r.try_get("read_ms")?)?,
        created_at: from_ms(r.try_get("created_ms")?)?,
    })
}
