use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::NotificationRecord;

/// A notification together with the address it is delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Addressed {
    pub record: NotificationRecord,
    pub email: String,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, record: &NotificationRecord) -> Result<()>;

    async fn fetch_by_id(&self, id: &Uuid) -> Result<Option<NotificationRecord>>;

    /// Record plus the owner's email address.
    async fn fetch_addressed(&self, id: &Uuid) -> Result<Option<Addressed>>;

    async fn list_for_alert(&self, alert_id: &Uuid) -> Result<Vec<NotificationRecord>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<NotificationRecord>>;

    async fn list_unread(&self, user_id: &Uuid) -> Result<Vec<NotificationRecord>>;

    /// PENDING -> SENT. `false` when the record was not pending.
    async fn mark_sent(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// PENDING -> FAILED with `error`. `false` when the record was not pending.
    async fn mark_failed(&self, id: &Uuid, error: &str) -> Result<bool>;

    /// Sets `read_at` unless already set. `true` only for the first read.
    async fn mark_read(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Deletes read notifications whose `read_at` precedes `cutoff`.
    /// Unread notifications are never removed.
    async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
