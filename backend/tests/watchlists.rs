mod support;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::AnyPool;

use stockwatch::accounts::{AccountTier, Actor};
use stockwatch::error::{AccessError, ValidationError};
use stockwatch::stocks::{SqlxStockRepository, StockRepository};
use stockwatch::watchlists::{SqlxWatchlistRepository, WatchlistService};
use support::*;

fn service(pool: &AnyPool) -> WatchlistService {
    WatchlistService::new(Arc::new(SqlxWatchlistRepository::new(pool.clone())), price_store(pool))
}

fn staff(of: &Actor) -> Actor {
    Actor {
        user_id: uuid::Uuid::new_v4(),
        is_staff: true,
        ..*of
    }
}

#[tokio::test]
async fn standard_accounts_get_one_watchlist() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "std@example.com", AccountTier::Standard).await;

    let first = svc.create_watchlist(&me, "Tech", Utc::now()).await.unwrap();
    assert!(first.is_default);

    let err = svc.create_watchlist(&me, "Energy", Utc::now()).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<AccessError>(),
        Some(&AccessError::WatchlistLimit { max: 1 })
    );
}

#[tokio::test]
async fn premium_accounts_switch_their_default() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "pro@example.com", AccountTier::Premium).await;

    let tech = svc.create_watchlist(&me, "Tech", Utc::now()).await.unwrap();
    let energy = svc.create_watchlist(&me, "Energy", Utc::now()).await.unwrap();
    assert!(tech.is_default);
    assert!(!energy.is_default);

    svc.set_default(&me, &energy.id, Utc::now()).await.unwrap();

    let lists = svc.list(&me).await.unwrap();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].id, energy.id);
    assert!(lists[0].is_default);
    assert!(!lists[1].is_default);
}

#[tokio::test]
async fn names_are_unique_per_user() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "pro@example.com", AccountTier::Premium).await;
    let other = seed_actor(&pool, "other@example.com", AccountTier::Premium).await;

    svc.create_watchlist(&me, "Tech", Utc::now()).await.unwrap();
    let err = svc.create_watchlist(&me, " Tech ", Utc::now()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ValidationError>(),
        Some(ValidationError::DuplicateWatchlist(_))
    ));

    svc.create_watchlist(&other, "Tech", Utc::now()).await.unwrap();
}

#[tokio::test]
async fn items_reject_duplicates_and_inactive_stocks() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "std@example.com", AccountTier::Standard).await;
    let wl = svc.create_watchlist(&me, "Main", Utc::now()).await.unwrap();
    let aapl = seed_stock(&pool, "AAPL").await;
    let gone = seed_stock(&pool, "GONE").await;
    SqlxStockRepository::new(pool.clone())
        .soft_delete(&gone.id, Utc::now())
        .await
        .unwrap();

    let item = svc
        .add_stock(&me, &wl.id, &aapl.id, Some(json!({"above": 200})), Utc::now())
        .await
        .unwrap();
    assert_eq!(item.alert_thresholds["above"], 200);

    let dup = svc.add_stock(&me, &wl.id, &aapl.id, None, Utc::now()).await.unwrap_err();
    assert_eq!(
        dup.downcast_ref::<ValidationError>(),
        Some(&ValidationError::DuplicateWatchlistItem)
    );

    let inactive = svc.add_stock(&me, &wl.id, &gone.id, None, Utc::now()).await.unwrap_err();
    assert!(matches!(
        inactive.downcast_ref::<ValidationError>(),
        Some(ValidationError::UnknownStock(_))
    ));

    assert!(svc.remove_stock(&me, &wl.id, &aapl.id).await.unwrap());
    assert!(!svc.remove_stock(&me, &wl.id, &aapl.id).await.unwrap());
}

#[tokio::test]
async fn only_owner_or_staff_may_modify() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "me@example.com", AccountTier::Standard).await;
    let stranger = seed_actor(&pool, "x@example.com", AccountTier::Premium).await;
    let wl = svc.create_watchlist(&me, "Main", Utc::now()).await.unwrap();
    let aapl = seed_stock(&pool, "AAPL").await;

    let err = svc
        .add_stock(&stranger, &wl.id, &aapl.id, None, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<AccessError>(), Some(&AccessError::NotOwner));

    svc.add_stock(&staff(&stranger), &wl.id, &aapl.id, None, Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn entries_show_latest_prices() {
    let pool = setup_pool().await;
    let prices = price_store(&pool);
    let svc = WatchlistService::new(
        Arc::new(SqlxWatchlistRepository::new(pool.clone())),
        prices.clone(),
    );
    let me = seed_actor(&pool, "me@example.com", AccountTier::Standard).await;
    let wl = svc.create_watchlist(&me, "Main", Utc::now()).await.unwrap();

    let msft = seed_stock(&pool, "MSFT").await;
    let aapl = seed_stock(&pool, "AAPL").await;
    svc.add_stock(&me, &wl.id, &msft.id, None, Utc::now()).await.unwrap();
    svc.add_stock(&me, &wl.id, &aapl.id, None, Utc::now()).await.unwrap();

    record_price(&prices, aapl.id, dec(18950, 2), at(2024, 5, 1, 15, 0)).await;

    let entries = svc.entries(&me, &wl.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].stock.symbol, "AAPL");
    assert_eq!(
        entries[0].latest_price.as_ref().map(|p| p.price),
        Some(dec(18950, 2))
    );
    assert_eq!(entries[1].stock.symbol, "MSFT");
    assert!(entries[1].latest_price.is_none());
    assert!(entries[1].item.alert_thresholds.as_object().is_some_and(|m| m.is_empty()));
}

#[tokio::test]
async fn deleting_a_watchlist_frees_the_slot() {
    let pool = setup_pool().await;
    let svc = service(&pool);
    let me = seed_actor(&pool, "std@example.com", AccountTier::Standard).await;
    let aapl = seed_stock(&pool, "AAPL").await;

    let wl = svc.create_watchlist(&me, "Main", Utc::now()).await.unwrap();
    svc.add_stock(&me, &wl.id, &aapl.id, None, Utc::now()).await.unwrap();
    svc.delete_watchlist(&me, &wl.id).await.unwrap();

    let again = svc.create_watchlist(&me, "Fresh", Utc::now()).await.unwrap();
    assert!(again.is_default);
    assert!(svc.entries(&me, &again.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_creates_cannot_exceed_the_tier_limit() {
    let pool = setup_pool().await;
    let svc = Arc::new(service(&pool));
    let me = seed_actor(&pool, "std@example.com", AccountTier::Standard).await;

    let handles: Vec<_> = ["One", "Two", "Three", "Four"]
        .into_iter()
        .map(|name| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.create_watchlist(&me, name, Utc::now()).await })
        })
        .collect();

    let mut created = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            created += 1;
        }
    }

    let lists = svc.list(&me).await.unwrap();
    assert!(created <= 1);
    assert_eq!(lists.len(), created);

    if lists.is_empty() {
        svc.create_watchlist(&me, "Retry", Utc::now()).await.unwrap();
    }
    let err = svc.create_watchlist(&me, "Extra", Utc::now()).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<AccessError>(),
        Some(&AccessError::WatchlistLimit { max: 1 })
    );
}
