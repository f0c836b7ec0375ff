use std::sync::Arc;

use async_trait::async_trait;

use super::repository::NotificationRepository;
use crate::jobs::Job;
use crate::time;

/// Daily sweep of read notifications older than the retention window.
pub struct NotificationRetentionJob {
    notifications: Arc<dyn NotificationRepository>,
    retention_days: i64,
}

impl NotificationRetentionJob {
    pub fn new(notifications: Arc<dyn NotificationRepository>, retention_days: i64) -> Self {
        Self {
            notifications,
            retention_days,
        }
    }
}

#[async_trait]
impl Job for NotificationRetentionJob {
    fn name(&self) -> &'static str {
        "notification_retention"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let cutoff = time::days_before(time::now(), self.retention_days)?;
        self.notifications.delete_read_before(cutoff).await.map(|_| ())
    }
}
