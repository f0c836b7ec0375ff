//! Periodic alert evaluation.
//!
//! Data flow:
//! pending alerts → latest price (cache-first) → condition check →
//! conditional trigger + PENDING notification (one transaction) →
//! delivery task on the queue
//!
//! Delivery never runs inline, so a slow mail relay cannot hold up the scan.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::logger::{annotate_span, child_span};
use tracing::{Instrument, debug, error, info, warn};

use super::condition;
use super::model::{AlertContext, ConditionType};
use super::repository::AlertRepository;
use crate::jobs::{Job, Task, TaskQueue};
use crate::metrics::Counters;
use crate::notifications::content;
use crate::notifications::{NotificationKind, NotificationRecord};
use crate::pricing::PriceStore;
use crate::time;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub no_price: usize,
    pub errored: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    NoPrice,
    Checked,
    Triggered,
    /// Another run triggered the alert between our read and our update.
    Raced,
}

pub struct AlertEvaluator {
    alerts: Arc<dyn AlertRepository>,
    prices: Arc<PriceStore>,
    queue: TaskQueue,
    /// Look-back for the PERCENT_CHANGE baseline, measured from the latest
    /// price's timestamp.
    baseline_window: chrono::Duration,
    frontend_url: String,
    counters: Counters,
}

impl AlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        prices: Arc<PriceStore>,
        queue: TaskQueue,
        baseline_window: chrono::Duration,
        frontend_url: String,
        counters: Counters,
    ) -> Self {
        Self {
            alerts,
            prices,
            queue,
            baseline_window,
            frontend_url,
            counters,
        }
    }

    /// One scan over every pending alert.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<EvaluationSummary> {
        let pending = self
            .alerts
            .list_pending()
            .await
            .context("failed to list pending alerts")?;

        info!(count = pending.len(), "evaluating price alerts");

        let mut summary = EvaluationSummary::default();
        for ctx in &pending {
            let span = child_span("evaluate_alert");
            match self.evaluate_one(ctx, now).instrument(span).await {
                Ok(Outcome::NoPrice) => {
                    summary.no_price += 1;
                    Counters::incr(&self.counters.alerts_no_price);
                }
                Ok(Outcome::Checked) | Ok(Outcome::Raced) => {
                    summary.evaluated += 1;
                    Counters::incr(&self.counters.alerts_evaluated);
                }
                Ok(Outcome::Triggered) => {
                    summary.evaluated += 1;
                    summary.triggered += 1;
                    Counters::incr(&self.counters.alerts_evaluated);
                    Counters::incr(&self.counters.alerts_triggered);
                }
                Err(e) => {
                    summary.errored += 1;
                    Counters::incr(&self.counters.alerts_errored);
                    error!(alert_id = %ctx.alert.id, error = ?e, "alert evaluation failed; continuing");
                }
            }
        }

        info!(
            evaluated = summary.evaluated,
            triggered = summary.triggered,
            no_price = summary.no_price,
            errored = summary.errored,
            "alert evaluation complete"
        );
        Ok(summary)
    }

    async fn evaluate_one(&self, ctx: &AlertContext, now: DateTime<Utc>) -> Result<Outcome> {
        let alert = &ctx.alert;
        annotate_span(Some(ctx.symbol.as_str()), Some(&alert.id));

        let Some(latest) = self.prices.latest_price(&alert.stock_id).await? else {
            debug!("no price recorded yet; skipping");
            return Ok(Outcome::NoPrice);
        };

        let baseline = match alert.condition {
            ConditionType::PercentChange => self
                .prices
                .price_at_or_before(&alert.stock_id, latest.timestamp - self.baseline_window)
                .await?
                .map(|p| p.price),
            ConditionType::PriceAbove | ConditionType::PriceBelow => None,
        };

        if !condition::evaluate(alert.condition, alert.threshold, latest.price, baseline) {
            self.alerts.touch_checked(&alert.id, now).await?;
            return Ok(Outcome::Checked);
        }

        let msg = content::price_alert(ctx, latest.price, &self.frontend_url);
        let record = NotificationRecord::pending(
            alert.user_id,
            Some(alert.id),
            NotificationKind::PriceAlert,
            msg.subject,
            msg.body,
            now,
        );

        if !self.alerts.mark_triggered(&alert.id, now, &record).await? {
            Counters::incr(&self.counters.alerts_trigger_raced);
            warn!("alert was triggered concurrently; not notifying twice");
            return Ok(Outcome::Raced);
        }

        info!(
            price = %latest.price,
            threshold = %alert.threshold,
            condition = %alert.condition,
            to = %ctx.user_email,
            "alert triggered"
        );

        // The PENDING record is committed; a lost enqueue leaves it for
        // inspection rather than failing the trigger.
        if let Err(e) = self
            .queue
            .enqueue(Task::DeliverNotification {
                notification_id: record.id,
            })
            .await
        {
            error!(notification_id = %record.id, error = ?e, "failed to queue notification delivery");
        }

        Ok(Outcome::Triggered)
    }
}

#[async_trait]
impl Job for AlertEvaluator {
    fn name(&self) -> &'static str {
        "alert_evaluation"
    }

    async fn run(&self) -> Result<()> {
        self.run_once(time::now()).await.map(|_| ())
    }
}
