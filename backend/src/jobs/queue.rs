//! Ad-hoc task queue.
//!
//! Producers (the evaluator, admin entry points) push [`Task`]s onto a
//! bounded channel; a single [`TaskWorker`] drains it and spawns one tokio
//! task per item, so a slow delivery holds up neither the producer nor
//! other deliveries.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use common::{TraceId, job_span};
use rust_decimal::Decimal;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use super::retry::{RetryPolicy, retry};
use crate::metrics::Counters;
use crate::notifications::NotificationDispatcher;
use crate::pricing::backfill::HistoricalBackfill;
use crate::time;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task {
    /// Deliver an already recorded PENDING notification.
    DeliverNotification { notification_id: Uuid },
    /// Record and deliver a price-alert notification.
    NotifyPriceAlert { alert_id: Uuid, price: Decimal },
    SendBulk {
        user_ids: Vec<Uuid>,
        subject: String,
        message: String,
    },
    Backfill {
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeliverNotification { .. } => "deliver_notification",
            Self::NotifyPriceAlert { .. } => "notify_price_alert",
            Self::SendBulk { .. } => "send_bulk",
            Self::Backfill { .. } => "historical_backfill",
        }
    }
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    counters: Counters,
}

impl TaskQueue {
    pub fn new(capacity: usize, counters: Counters) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, counters }, rx)
    }

    /// Queues `task`, waiting for room when the queue is full.
    pub async fn enqueue(&self, task: Task) -> Result<()> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                Counters::incr(&self.counters.dispatch_queue_full);
                warn!(task = task.name(), "task queue full; waiting for capacity");
                self.tx
                    .send(task)
                    .await
                    .map_err(|e| anyhow!("task queue closed; dropped {}", e.0.name()))
            }
            Err(TrySendError::Closed(task)) => {
                Err(anyhow!("task queue closed; dropped {}", task.name()))
            }
        }
    }
}

pub struct TaskWorker {
    dispatcher: Arc<NotificationDispatcher>,
    backfill: Arc<HistoricalBackfill>,
    backfill_policy: RetryPolicy,
}

impl TaskWorker {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        backfill: Arc<HistoricalBackfill>,
        backfill_policy: RetryPolicy,
    ) -> Self {
        Self {
            dispatcher,
            backfill,
            backfill_policy,
        }
    }

    /// Drains `rx` until every producer handle is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Task>) {
        info!("task worker started");

        while let Some(task) = rx.recv().await {
            let trace_id = TraceId::default();
            let span = job_span(task.name(), &trace_id);
            let worker = Arc::clone(&self);

            tokio::spawn(
                async move {
                    let name = task.name();
                    if let Err(e) = worker.handle(task).await {
                        error!(task = name, error = ?e, "task failed");
                    }
                }
                .instrument(span),
            );
        }

        info!("task queue closed; worker exiting");
    }

    /// Runs one task to completion on the current task.
    pub async fn handle(&self, task: Task) -> Result<()> {
        match task {
            Task::DeliverNotification { notification_id } => {
                self.dispatcher.deliver(&notification_id).await.map(|_| ())
            }
            Task::NotifyPriceAlert { alert_id, price } => {
                self.dispatcher.notify_price_alert(&alert_id, price).await.map(|_| ())
            }
            Task::SendBulk {
                user_ids,
                subject,
                message,
            } => self
                .dispatcher
                .send_bulk(&user_ids, &subject, &message)
                .await
                .map(|_| ()),
            Task::Backfill { symbol, from, to } => {
                let backfill = &self.backfill;
                let symbol = symbol.as_str();
                retry("historical_backfill", self.backfill_policy, |_| async move {
                    backfill.backfill(symbol, from, to, time::now()).await
                })
                .await
                .map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_waits_and_counts() {
        let counters = Counters::default();
        let (queue, mut rx) = TaskQueue::new(1, counters.clone());

        let first = Task::DeliverNotification {
            notification_id: Uuid::new_v4(),
        };
        let second = Task::DeliverNotification {
            notification_id: Uuid::new_v4(),
        };

        queue.enqueue(first.clone()).await.unwrap();

        let q = queue.clone();
        let pending = tokio::spawn({
            let second = second.clone();
            async move { q.enqueue(second).await }
        });
        // let the producer hit the full queue before draining it
        tokio::task::yield_now().await;

        assert_eq!(rx.recv().await, Some(first));
        pending.await.unwrap().unwrap();
        assert_eq!(rx.recv().await, Some(second));
        assert_eq!(Counters::get(&counters.dispatch_queue_full), 1);
    }

    #[tokio::test]
    async fn closed_queue_is_an_error() {
        let (queue, rx) = TaskQueue::new(4, Counters::default());
        drop(rx);

        let err = queue
            .enqueue(Task::Backfill {
                symbol: "AAPL".into(),
                from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("historical_backfill"));
    }
}
