mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::AnyPool;

use stockwatch::accounts::{AccountTier, SqlxUserRepository, UserRepository};
use stockwatch::alerts::{AlertEvaluator, AlertRepository, ConditionType, NewAlert, SqlxAlertRepository};
use stockwatch::jobs::{Job, RetryPolicy, TaskQueue, TaskWorker};
use stockwatch::metrics::Counters;
use stockwatch::notifications::retention::NotificationRetentionJob;
use stockwatch::notifications::{
    Mailer, NotificationDispatcher, NotificationKind, NotificationRecord, NotificationRepository,
    NotificationStatus, SqlxNotificationRepository,
};
use stockwatch::pricing::backfill::HistoricalBackfill;
use stockwatch::stocks::SqlxStockRepository;
use support::*;

fn dispatcher(pool: &AnyPool, mailer: Arc<dyn Mailer>, counters: Counters) -> NotificationDispatcher {
    NotificationDispatcher::new(
        Arc::new(SqlxNotificationRepository::new(pool.clone())),
        Arc::new(SqlxAlertRepository::new(pool.clone())),
        Arc::new(SqlxUserRepository::new(pool.clone())),
        mailer,
        RetryPolicy::fixed(3, Duration::ZERO),
        "https://watch.example.com".to_string(),
        counters,
    )
}

async fn pending_system_note(pool: &AnyPool, user_id: uuid::Uuid) -> NotificationRecord {
    let repo = SqlxNotificationRepository::new(pool.clone());
    let note = NotificationRecord::pending(
        user_id,
        None,
        NotificationKind::System,
        "Maintenance",
        "Back at 02:00 UTC",
        Utc::now(),
    );
    repo.create(&note).await.unwrap();
    note
}

#[tokio::test]
async fn delivery_succeeding_on_any_attempt_marks_one_record_sent() {
    for failures in 0..3 {
        let pool = setup_pool().await;
        let (user, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
        let note = pending_system_note(&pool, user.id).await;

        let mailer = Arc::new(MockMailer::failing_first(failures));
        let counters = Counters::default();
        let status = dispatcher(&pool, mailer.clone(), counters.clone())
            .deliver(&note.id)
            .await
            .unwrap();

        assert_eq!(status, NotificationStatus::Sent, "failures before success: {failures}");
        assert_eq!(mailer.attempts(), failures + 1);

        let repo = SqlxNotificationRepository::new(pool.clone());
        let all = repo.list_for_user(&user.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, NotificationStatus::Sent);
        assert!(all[0].sent_at.is_some());
        assert!(all[0].error_message.is_empty());
        assert_eq!(Counters::get(&counters.notifications_sent), 1);
    }
}

#[tokio::test]
async fn three_failures_leave_the_record_failed_with_last_error() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
    let note = pending_system_note(&pool, user.id).await;

    let mailer = Arc::new(MockMailer::failing_first(3));
    let counters = Counters::default();
    let status = dispatcher(&pool, mailer.clone(), counters.clone())
        .deliver(&note.id)
        .await
        .unwrap();

    assert_eq!(status, NotificationStatus::Failed);
    assert_eq!(mailer.attempts(), 3);

    let repo = SqlxNotificationRepository::new(pool.clone());
    let stored = repo.fetch_by_id(&note.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Failed);
    assert_eq!(stored.error_message, "mail relay timed out");
    assert_eq!(stored.sent_at, None);
    assert_eq!(repo.list_for_user(&user.id).await.unwrap().len(), 1);
    assert_eq!(Counters::get(&counters.notifications_failed), 1);
}

#[tokio::test]
async fn settled_records_are_not_resent() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
    let note = pending_system_note(&pool, user.id).await;

    let mailer = Arc::new(MockMailer::default());
    let d = dispatcher(&pool, mailer.clone(), Counters::default());

    d.deliver(&note.id).await.unwrap();
    let again = d.deliver(&note.id).await.unwrap();

    assert_eq!(again, NotificationStatus::Sent);
    assert_eq!(mailer.attempts(), 1);
}

#[tokio::test]
async fn price_alert_notification_is_recorded_once_and_sent() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "trader@example.com", AccountTier::Standard).await;
    let stock = seed_stock(&pool, "TSLA").await;
    let alert = SqlxAlertRepository::new(pool.clone())
        .create(
            NewAlert {
                user_id: user.id,
                stock_id: stock.id,
                condition: ConditionType::PriceAbove,
                threshold: dec(25000, 2),
                one_time: true,
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let mailer = Arc::new(MockMailer::failing_first(1));
    let status = dispatcher(&pool, mailer.clone(), Counters::default())
        .notify_price_alert(&alert.id, dec(25125, 2))
        .await
        .unwrap();
    assert_eq!(status, NotificationStatus::Sent);

    let notes = SqlxNotificationRepository::new(pool.clone())
        .list_for_alert(&alert.id)
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, NotificationStatus::Sent);

    let delivered = mailer.delivered.lock().clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].to, "trader@example.com");
    assert!(delivered[0].body.contains("251.25"));
    assert!(delivered[0].body.contains("https://watch.example.com/watchlist/"));
}

#[tokio::test]
async fn bulk_send_continues_past_failed_recipients() {
    let pool = setup_pool().await;
    let (a, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
    let (b, _) = seed_user(&pool, "b@example.com", AccountTier::Standard).await;
    let (c, _) = seed_user(&pool, "c@example.com", AccountTier::Standard).await;
    let (gone, _) = seed_user(&pool, "gone@example.com", AccountTier::Standard).await;
    SqlxUserRepository::new(pool.clone()).soft_delete(&gone.id).await.unwrap();

    let mailer = Arc::new(MockMailer::failing_for("b@example.com"));
    let summary = dispatcher(&pool, mailer.clone(), Counters::default())
        .send_bulk(
            &[a.id, b.id, c.id, gone.id],
            "Scheduled maintenance",
            "The service is offline Sunday 02:00-03:00 UTC.",
        )
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.sent, 2);

    let repo = SqlxNotificationRepository::new(pool.clone());
    let b_notes = repo.list_for_user(&b.id).await.unwrap();
    assert_eq!(b_notes.len(), 1);
    assert_eq!(b_notes[0].status, NotificationStatus::Failed);
    assert_eq!(b_notes[0].kind, NotificationKind::System);

    for user in [&a, &c] {
        let notes = repo.list_for_user(&user.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].status, NotificationStatus::Sent);
    }
    assert!(repo.list_for_user(&gone.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn triggered_alert_flows_through_the_queue_to_delivery() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "trader@example.com", AccountTier::Standard).await;
    let stock = seed_stock(&pool, "AAPL").await;
    let prices = price_store(&pool);
    let alerts = Arc::new(SqlxAlertRepository::new(pool.clone()));

    let alert = alerts
        .create(
            NewAlert {
                user_id: user.id,
                stock_id: stock.id,
                condition: ConditionType::PriceBelow,
                threshold: dec(18000, 2),
                one_time: true,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    record_price(&prices, stock.id, dec(17550, 2), at(2024, 5, 1, 14, 0)).await;

    let counters = Counters::default();
    let (queue, mut rx) = TaskQueue::new(8, counters.clone());
    let evaluator = AlertEvaluator::new(
        alerts.clone(),
        prices.clone(),
        queue,
        chrono::Duration::hours(24),
        "http://localhost:3000".to_string(),
        counters.clone(),
    );
    evaluator.run_once(at(2024, 5, 1, 14, 5)).await.unwrap();

    let mailer = Arc::new(MockMailer::default());
    let worker = TaskWorker::new(
        Arc::new(dispatcher(&pool, mailer.clone(), counters.clone())),
        Arc::new(HistoricalBackfill::new(
            Arc::new(SqlxStockRepository::new(pool.clone())),
            Arc::new(MockProvider::default()),
            prices.clone(),
        )),
        RetryPolicy::none(),
    );

    let task = rx.try_recv().unwrap();
    worker.handle(task).await.unwrap();

    let notes = SqlxNotificationRepository::new(pool.clone())
        .list_for_alert(&alert.id)
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, NotificationStatus::Sent);

    let delivered = mailer.delivered.lock().clone();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].body.contains("175.50"));
    assert!(delivered[0].body.contains("180.00"));
}

#[tokio::test]
async fn first_read_wins() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
    let note = pending_system_note(&pool, user.id).await;
    let repo = SqlxNotificationRepository::new(pool.clone());

    assert_eq!(repo.list_unread(&user.id).await.unwrap().len(), 1);

    let first = at(2024, 5, 1, 9, 0);
    assert!(repo.mark_read(&note.id, first).await.unwrap());
    assert!(!repo.mark_read(&note.id, at(2024, 5, 2, 9, 0)).await.unwrap());

    let stored = repo.fetch_by_id(&note.id).await.unwrap().unwrap();
    assert_eq!(stored.read_at, Some(first));
    assert!(repo.list_unread(&user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn retention_keeps_unread_and_recent_notifications() {
    let pool = setup_pool().await;
    let (user, _) = seed_user(&pool, "a@example.com", AccountTier::Standard).await;
    let repo = Arc::new(SqlxNotificationRepository::new(pool.clone()));

    let old_read = pending_system_note(&pool, user.id).await;
    let recent_read = pending_system_note(&pool, user.id).await;
    let old_unread = pending_system_note(&pool, user.id).await;

    repo.mark_read(&old_read.id, Utc::now() - chrono::Duration::days(120))
        .await
        .unwrap();
    repo.mark_read(&recent_read.id, Utc::now() - chrono::Duration::days(5))
        .await
        .unwrap();

    NotificationRetentionJob::new(repo.clone(), 90).run().await.unwrap();

    assert!(repo.fetch_by_id(&old_read.id).await.unwrap().is_none());
    assert!(repo.fetch_by_id(&recent_read.id).await.unwrap().is_some());
    assert!(repo.fetch_by_id(&old_unread.id).await.unwrap().is_some());
}
