//! Notification delivery.
//!
//! Every notification is recorded as PENDING before the first send attempt
//! and then settled in place: SENT on success, FAILED with the last error
//! once the retry policy is exhausted. Retries never create a second record.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::content;
use super::mailer::{Mailer, OutgoingEmail};
use super::model::{NotificationKind, NotificationRecord, NotificationStatus};
use super::repository::NotificationRepository;
use crate::accounts::UserRepository;
use crate::alerts::AlertRepository;
use crate::jobs::{RetryPolicy, retry};
use crate::metrics::Counters;
use crate::time;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub sent: usize,
    pub total: usize,
}

pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationRepository>,
    alerts: Arc<dyn AlertRepository>,
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    policy: RetryPolicy,
    frontend_url: String,
    counters: Counters,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        alerts: Arc<dyn AlertRepository>,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        policy: RetryPolicy,
        frontend_url: String,
        counters: Counters,
    ) -> Self {
        Self {
            notifications,
            alerts,
            users,
            mailer,
            policy,
            frontend_url,
            counters,
        }
    }

    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    /// Delivers an existing PENDING notification and settles its status.
    ///
    /// Returns the final status. Records that are already SENT or FAILED are
    /// left alone. `Err` is reserved for storage failures.
    #[instrument(skip(self), target = "dispatch")]
    pub async fn deliver(&self, notification_id: &Uuid) -> Result<NotificationStatus> {
        let addressed = self
            .notifications
            .fetch_addressed(notification_id)
            .await?
            .ok_or_else(|| anyhow!("notification {notification_id} not found"))?;

        let record = addressed.record;
        if record.status.is_terminal() {
            debug!(status = %record.status, "notification already settled");
            return Ok(record.status);
        }

        let email = OutgoingEmail {
            to: addressed.email,
            subject: record.subject,
            body: record.body,
        };

        let mailer = &self.mailer;
        let email_ref = &email;
        let sent = retry("deliver_notification", self.policy, |attempt| async move {
            debug!(attempt, to = %email_ref.to, "sending notification");
            mailer.send(email_ref).await.map_err(anyhow::Error::from)
        })
        .await;

        match sent {
            Ok(()) => {
                self.notifications
                    .mark_sent(notification_id, time::now())
                    .await
                    .context("failed to mark notification sent")?;
                Counters::incr(&self.counters.notifications_sent);
                info!(to = %email.to, "notification sent");
                Ok(NotificationStatus::Sent)
            }
            Err(e) => {
                self.notifications
                    .mark_failed(notification_id, &e.to_string())
                    .await
                    .context("failed to mark notification failed")?;
                Counters::incr(&self.counters.notifications_failed);
                error!(to = %email.to, error = %e, "notification delivery failed");
                Ok(NotificationStatus::Failed)
            }
        }
    }

    /// Records and delivers a price-alert notification for `alert_id`
    /// observed at `price`.
    #[instrument(skip(self), target = "dispatch")]
    pub async fn notify_price_alert(&self, alert_id: &Uuid, price: Decimal) -> Result<NotificationStatus> {
        let ctx = self
            .alerts
            .fetch_context(alert_id)
            .await?
            .ok_or_else(|| anyhow!("alert {alert_id} not found"))?;

        let msg = content::price_alert(&ctx, price, &self.frontend_url);
        let record = NotificationRecord::pending(
            ctx.alert.user_id,
            Some(ctx.alert.id),
            NotificationKind::PriceAlert,
            msg.subject,
            msg.body,
            time::now(),
        );
        self.notifications.create(&record).await?;

        self.deliver(&record.id).await
    }

    /// Sends the same message to every active user in `user_ids`. Each
    /// recipient gets its own record; one failure never stops the rest.
    #[instrument(skip(self, user_ids, message), target = "dispatch", fields(recipients = user_ids.len()))]
    pub async fn send_bulk(&self, user_ids: &[Uuid], subject: &str, message: &str) -> Result<BulkSummary> {
        let users = self
            .users
            .fetch_active_by_ids(user_ids)
            .await
            .context("failed to load bulk recipients")?;

        let mut summary = BulkSummary {
            sent: 0,
            total: users.len(),
        };

        for user in &users {
            let record = NotificationRecord::pending(
                user.id,
                None,
                NotificationKind::System,
                subject,
                message,
                time::now(),
            );
            if let Err(e) = self.notifications.create(&record).await {
                error!(user_id = %user.id, error = ?e, "failed to record bulk notification");
                continue;
            }

            let email = OutgoingEmail {
                to: user.email.clone(),
                subject: subject.to_string(),
                body: message.to_string(),
            };

            match self.mailer.send(&email).await {
                Ok(()) => {
                    if let Err(e) = self.notifications.mark_sent(&record.id, time::now()).await {
                        warn!(notification_id = %record.id, error = ?e, "sent but status not updated");
                    }
                    Counters::incr(&self.counters.notifications_sent);
                    summary.sent += 1;
                }
                Err(send_err) => {
                    if let Err(e) = self
                        .notifications
                        .mark_failed(&record.id, &send_err.to_string())
                        .await
                    {
                        warn!(notification_id = %record.id, error = ?e, "failed status not recorded");
                    }
                    Counters::incr(&self.counters.notifications_failed);
                    error!(to = %user.email, error = %send_err, "bulk notification failed for recipient");
                }
            }
        }

        info!(sent = summary.sent, total = summary.total, "bulk notification finished");
        Ok(summary)
    }
}
