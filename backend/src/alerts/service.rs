use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::model::{Alert, ConditionType, NewAlert};
use super::repository::AlertRepository;
use crate::accounts::Actor;
use crate::accounts::permissions::ensure_owner_or_admin;

/// User-facing alert management. Every call is made on behalf of an
/// [`Actor`] and checked against the alert's owner.
pub struct AlertService {
    alerts: Arc<dyn AlertRepository>,
}

impl AlertService {
    pub fn new(alerts: Arc<dyn AlertRepository>) -> Self {
        Self { alerts }
    }

    /// Creates an alert owned by `actor`.
    pub async fn create_alert(
        &self,
        actor: &Actor,
        stock_id: Uuid,
        condition: ConditionType,
        threshold: Decimal,
        one_time: bool,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let new = NewAlert {
            user_id: actor.user_id,
            stock_id,
            condition,
            threshold,
            one_time,
        };
        self.alerts.create(new, now).await
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Alert>> {
        self.alerts.list_for_user(&actor.user_id).await
    }

    pub async fn deactivate(&self, actor: &Actor, alert_id: &Uuid, now: DateTime<Utc>) -> Result<()> {
        self.owned(actor, alert_id).await?;
        self.alerts.set_active(alert_id, false, now).await
    }

    pub async fn reactivate(&self, actor: &Actor, alert_id: &Uuid, now: DateTime<Utc>) -> Result<()> {
        self.owned(actor, alert_id).await?;
        self.alerts.set_active(alert_id, true, now).await
    }

    pub async fn delete(&self, actor: &Actor, alert_id: &Uuid) -> Result<()> {
        self.owned(actor, alert_id).await?;
        self.alerts.delete(alert_id).await?;
        Ok(())
    }

    async fn owned(&self, actor: &Actor, alert_id: &Uuid) -> Result<Alert> {
        let alert = self
            .alerts
            .fetch_by_id(alert_id)
            .await?
            .ok_or_else(|| anyhow!("alert {alert_id} not found"))?;
        ensure_owner_or_admin(actor, alert.user_id)?;
        Ok(alert)
    }
}
