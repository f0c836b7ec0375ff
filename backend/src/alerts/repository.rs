use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Alert, AlertContext, NewAlert};
use crate::notifications::NotificationRecord;

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Validates `new` and requires its stock to exist and be active.
    async fn create(&self, new: NewAlert, now: DateTime<Utc>) -> Result<Alert>;

    async fn fetch_by_id(&self, alert_id: &Uuid) -> Result<Option<Alert>>;

    async fn fetch_context(&self, alert_id: &Uuid) -> Result<Option<AlertContext>>;

    /// Active, untriggered alerts: the evaluator's work list.
    async fn list_pending(&self) -> Result<Vec<AlertContext>>;

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Alert>>;

    async fn touch_checked(&self, alert_id: &Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Marks the alert triggered and stores `notification` as one unit.
    ///
    /// Conditional on `triggered_at` still being unset; returns `false`
    /// (and writes nothing) when another run got there first.
    async fn mark_triggered(
        &self,
        alert_id: &Uuid,
        now: DateTime<Utc>,
        notification: &NotificationRecord,
    ) -> Result<bool>;

    /// Reactivating also clears `triggered_at` so the alert can fire again.
    async fn set_active(&self, alert_id: &Uuid, active: bool, now: DateTime<Utc>) -> Result<()>;

    /// Removes the alert; its notifications survive with `alert_id` cleared.
    async fn delete(&self, alert_id: &Uuid) -> Result<bool>;
}
