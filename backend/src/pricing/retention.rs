use std::sync::Arc;

use async_trait::async_trait;

use super::store::PriceStore;
use crate::jobs::Job;
use crate::time;

/// Daily sweep removing price records past the retention window.
pub struct PriceRetentionJob {
    prices: Arc<PriceStore>,
    retention_days: i64,
}

impl PriceRetentionJob {
    pub fn new(prices: Arc<PriceStore>, retention_days: i64) -> Self {
        Self {
            prices,
            retention_days,
        }
    }
}

#[async_trait]
impl Job for PriceRetentionJob {
    fn name(&self) -> &'static str {
        "price_retention"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.prices
            .cleanup_older_than(time::now(), self.retention_days)
            .await
            .map(|_| ())
    }
}
