use std::sync::Arc;
use std::time::Duration;

use common::{TraceId, job_span};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{Instrument, error, info};

use super::Job;
use super::retry::{RetryPolicy, retry};
use crate::time;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs one invocation of `job` under a fresh trace id, retrying per `policy`.
/// A failure after the last attempt is logged and left to the next run.
pub async fn run_job_once(job: &dyn Job, policy: RetryPolicy) -> anyhow::Result<()> {
    let trace_id = TraceId::default();
    let span = job_span(job.name(), &trace_id);

    async {
        let res = retry(job.name(), policy, |_| job.run()).await;
        if let Err(e) = &res {
            error!(job = job.name(), error = ?e, "job failed; waiting for next scheduled run");
        }
        res
    }
    .instrument(span)
    .await
}

/// Fires `job` immediately and then every `every`. Invocations of the same
/// job never overlap; ticks missed while a run is in progress are skipped.
pub fn spawn_periodic(job: Arc<dyn Job>, every: Duration, policy: RetryPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            job = job.name(),
            every_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX),
            "periodic job scheduled"
        );

        loop {
            ticker.tick().await;
            let _ = run_job_once(job.as_ref(), policy).await;
        }
    })
}

/// Fires `job` every day at `hour_utc`:00.
pub fn spawn_daily_at(job: Arc<dyn Job>, hour_utc: u32, policy: RetryPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let now = time::now();
        let first = match time::next_daily_at(now, hour_utc) {
            Ok(first) => first,
            Err(e) => {
                error!(job = job.name(), error = ?e, "daily job not scheduled");
                return;
            }
        };
        let delay = (first - now).to_std().unwrap_or(Duration::ZERO);

        let mut ticker = interval_at(Instant::now() + delay, DAY);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(job = job.name(), first_run = %first, "daily job scheduled");

        loop {
            ticker.tick().await;
            let _ = run_job_once(job.as_ref(), policy).await;
        }
    })
}
