//! Scheduling primitives: periodic triggers, fixed-backoff retries and the
//! ad-hoc task queue.
//!
//! Every unit of work is one `Job::run` (or one queued `Task`) invocation
//! that completes, fails, or is retried as a whole.

pub mod periodic;
pub mod queue;
pub mod retry;

use async_trait::async_trait;

pub use periodic::{spawn_daily_at, spawn_periodic};
pub use queue::{Task, TaskQueue, TaskWorker};
pub use retry::{RetryPolicy, retry};

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}
