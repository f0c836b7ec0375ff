use std::sync::Arc;

use anyhow::Context;
use common::init_logger;
use stockwatch::{
    accounts::{SqlxUserRepository, UserRepository},
    alerts::{AlertEvaluator, AlertRepository, SqlxAlertRepository},
    cache::InMemoryCache,
    config::AppConfig,
    db::Db,
    jobs::{RetryPolicy, TaskQueue, TaskWorker, spawn_daily_at, spawn_periodic},
    metrics::Counters,
    notifications::{
        HttpRelayMailer, LogMailer, Mailer, NotificationDispatcher, NotificationRepository,
        SqlxNotificationRepository, retention::NotificationRetentionJob,
    },
    pricing::{
        PriceStore, SqlxPriceRepository,
        backfill::HistoricalBackfill,
        ingest::PriceIngestionJob,
        provider::{AlphaVantageClient, QuoteProvider},
        retention::PriceRetentionJob,
    },
    stocks::{SqlxStockRepository, StockRepository},
};

fn build_mailer(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match &cfg.mail_relay_url {
        Some(url) => {
            let relay = HttpRelayMailer::new(url.clone(), cfg.mail_from.clone(), cfg.mail_timeout)
                .context("failed to build mail relay client")?;
            tracing::info!(relay = %url, "email delivery via HTTP relay");
            Ok(Arc::new(relay))
        }
        None => {
            tracing::warn!("MAIL_RELAY_URL unset; emails are only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("stockwatch", is_production);

    tracing::info!("Starting stockwatch backend...");

    let cfg = AppConfig::from_env()?;
    let counters = Counters::default();

    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let users: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(db.pool.clone()));
    let stocks: Arc<dyn StockRepository> = Arc::new(SqlxStockRepository::new(db.pool.clone()));
    let alerts: Arc<dyn AlertRepository> = Arc::new(SqlxAlertRepository::new(db.pool.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlxNotificationRepository::new(db.pool.clone()));

    let prices = Arc::new(PriceStore::new(
        Arc::new(SqlxPriceRepository::new(db.pool.clone())),
        Arc::new(InMemoryCache::new()),
        cfg.latest_price_ttl,
    ));

    let provider: Arc<dyn QuoteProvider> = Arc::new(
        AlphaVantageClient::new(
            cfg.quote_api_base_url.clone(),
            cfg.quote_api_key.clone(),
            cfg.quote_timeout,
            cfg.backfill_timeout,
        )
        .context("failed to build quote client")?,
    );

    let task_policy = RetryPolicy::fixed(cfg.job_max_attempts, cfg.job_retry_backoff);
    let backfill_policy = RetryPolicy::fixed(cfg.job_max_attempts, cfg.backfill_retry_backoff);

    // Evaluator -> dispatcher queue
    let (queue, queue_rx) = TaskQueue::new(cfg.dispatch_queue_capacity, counters.clone());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&notifications),
        Arc::clone(&alerts),
        Arc::clone(&users),
        build_mailer(&cfg)?,
        task_policy,
        cfg.frontend_url.clone(),
        counters.clone(),
    ));
    let backfill = Arc::new(HistoricalBackfill::new(
        Arc::clone(&stocks),
        Arc::clone(&provider),
        Arc::clone(&prices),
    ));
    let worker = Arc::new(TaskWorker::new(dispatcher, backfill, backfill_policy));
    tokio::spawn(worker.run(queue_rx));

    let ingestion = Arc::new(PriceIngestionJob::new(
        Arc::clone(&stocks),
        provider,
        Arc::clone(&prices),
        cfg.ingest_interval,
        counters.clone(),
    ));
    spawn_periodic(ingestion, cfg.ingest_interval, task_policy);

    // Evaluation failures wait for the next tick.
    let evaluator = Arc::new(AlertEvaluator::new(
        alerts,
        Arc::clone(&prices),
        queue,
        cfg.percent_change_window,
        cfg.frontend_url.clone(),
        counters.clone(),
    ));
    spawn_periodic(evaluator, cfg.evaluate_interval, RetryPolicy::none());

    spawn_daily_at(
        Arc::new(PriceRetentionJob::new(prices, cfg.price_retention_days)),
        cfg.cleanup_hour_utc,
        RetryPolicy::none(),
    );
    spawn_daily_at(
        Arc::new(NotificationRetentionJob::new(
            notifications,
            cfg.notification_retention_days,
        )),
        cfg.cleanup_hour_utc,
        RetryPolicy::none(),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        prices_written = Counters::get(&counters.prices_written),
        alerts_triggered = Counters::get(&counters.alerts_triggered),
        notifications_sent = Counters::get(&counters.notifications_sent),
        notifications_failed = Counters::get(&counters.notifications_failed),
        "Shutdown signal received"
    );

    Ok(())
}
