use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Quote provider
    // =========================
    pub quote_api_base_url: String,
    pub quote_api_key: String,
    /// Hard timeout for one live quote request.
    pub quote_timeout: Duration,
    /// Timeout for the (much larger) historical series request.
    pub backfill_timeout: Duration,

    // =========================
    // Schedules
    // =========================
    /// Price ingestion cadence. Also the width of the timestamp bucket used
    /// as the idempotency key for ingested quotes.
    pub ingest_interval: Duration,
    /// Alert evaluation cadence.
    pub evaluate_interval: Duration,
    /// UTC hour at which the daily retention sweeps run.
    pub cleanup_hour_utc: u32,

    // =========================
    // Retry policy (task-level)
    // =========================
    /// Total attempts (first try included) of a retryable task.
    pub job_max_attempts: u32,
    /// Fixed delay between attempts.
    pub job_retry_backoff: Duration,
    /// Backoff for historical backfill attempts.
    pub backfill_retry_backoff: Duration,

    // =========================
    // Pricing / alerts
    // =========================
    /// TTL of the cached "latest price" entry per stock.
    pub latest_price_ttl: Duration,
    pub price_retention_days: i64,
    /// Look-back used to find the PERCENT_CHANGE baseline price.
    pub percent_change_window: chrono::Duration,

    // =========================
    // Notifications
    // =========================
    pub notification_retention_days: i64,
    pub frontend_url: String,
    pub mail_from: String,
    /// HTTP mail relay; when unset, deliveries are only logged.
    pub mail_relay_url: Option<String>,
    pub mail_timeout: Duration,
    /// Capacity of the evaluator -> dispatcher queue.
    pub dispatch_queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://stockwatch_dev.db?mode=rwc".to_string(),

            quote_api_base_url: "https://www.alphavantage.co/query".to_string(),
            quote_api_key: "demo".to_string(),
            quote_timeout: Duration::from_secs(10),
            backfill_timeout: Duration::from_secs(30),

            ingest_interval: Duration::from_secs(15 * 60),
            evaluate_interval: Duration::from_secs(5 * 60),
            cleanup_hour_utc: 2,

            job_max_attempts: 3,
            job_retry_backoff: Duration::from_secs(60),
            backfill_retry_backoff: Duration::from_secs(120),

            latest_price_ttl: Duration::from_secs(5 * 60),
            price_retention_days: 365,
            percent_change_window: chrono::Duration::hours(24),

            notification_retention_days: 90,
            frontend_url: "http://localhost:3000".to_string(),
            mail_from: "alerts@stockwatch.local".to_string(),
            mail_relay_url: None,
            mail_timeout: Duration::from_secs(10),
            dispatch_queue_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();

        Ok(Self {
            database_url: env_or("DATABASE_URL", d.database_url)?,

            quote_api_base_url: env_or("QUOTE_API_BASE_URL", d.quote_api_base_url)?,
            quote_api_key: env_or("QUOTE_API_KEY", d.quote_api_key)?,
            quote_timeout: secs_or("QUOTE_TIMEOUT_SECS", d.quote_timeout)?,
            backfill_timeout: secs_or("BACKFILL_TIMEOUT_SECS", d.backfill_timeout)?,

            ingest_interval: secs_or("INGEST_INTERVAL_SECS", d.ingest_interval)?,
            evaluate_interval: secs_or("EVALUATE_INTERVAL_SECS", d.evaluate_interval)?,
            cleanup_hour_utc: env_or("CLEANUP_HOUR_UTC", d.cleanup_hour_utc)?.min(23),

            job_max_attempts: env_or("JOB_MAX_ATTEMPTS", d.job_max_attempts)?.max(1),
            job_retry_backoff: secs_or("JOB_RETRY_BACKOFF_SECS", d.job_retry_backoff)?,
            backfill_retry_backoff: secs_or("BACKFILL_RETRY_BACKOFF_SECS", d.backfill_retry_backoff)?,

            latest_price_ttl: secs_or("LATEST_PRICE_TTL_SECS", d.latest_price_ttl)?,
            price_retention_days: env_or("PRICE_RETENTION_DAYS", d.price_retention_days)?,
            percent_change_window: hours_or("PERCENT_CHANGE_WINDOW_HOURS", d.percent_change_window)?,

            notification_retention_days: env_or(
                "NOTIFICATION_RETENTION_DAYS",
                d.notification_retention_days,
            )?,
            frontend_url: env_or("FRONTEND_URL", d.frontend_url)?,
            mail_from: env_or("MAIL_FROM", d.mail_from)?,
            mail_relay_url: std::env::var("MAIL_RELAY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            mail_timeout: secs_or("MAIL_TIMEOUT_SECS", d.mail_timeout)?,
            dispatch_queue_capacity: env_or("DISPATCH_QUEUE_CAPACITY", d.dispatch_queue_capacity)?
                .max(1),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn hours_or(key: &str, default: chrono::Duration) -> anyhow::Result<chrono::Duration> {
    let hours = env_or(key, default.num_hours())?;
    chrono::Duration::try_hours(hours).ok_or_else(|| anyhow!("{key} out of range: {hours}"))
}

fn secs_or(key: &str, default: Duration) -> anyhow::Result<Duration> {
    env_or(key, default.as_secs()).map(Duration::from_secs)
}
