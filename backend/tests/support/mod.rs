//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use stockwatch::accounts::{AccountTier, Actor, NewUser, Profile, SqlxUserRepository, User, UserRepository};
use stockwatch::cache::InMemoryCache;
use stockwatch::db::schema;
use stockwatch::notifications::{DeliveryError, Mailer, OutgoingEmail};
use stockwatch::pricing::provider::{DailyBar, QuoteError, QuoteFetch, QuoteProvider};
use stockwatch::pricing::{NewPrice, PriceSource, PriceStore, SqlxPriceRepository};
use stockwatch::stocks::{NewStock, SqlxStockRepository, Stock, StockRepository};

/// Isolated in-memory SQLite database with the full schema.
///
/// A unique name per call keeps parallel tests apart while the shared cache
/// lets every pooled connection see the same database.
pub async fn setup_pool() -> AnyPool {
    sqlx::any::install_default_drivers();

    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();
    pool
}

/// Whole-second instant, so values survive the millisecond round trip.
pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(v: i64, scale: u32) -> Decimal {
    Decimal::new(v, scale)
}

pub async fn seed_user(pool: &AnyPool, email: &str, tier: AccountTier) -> (User, Profile) {
    let repo = SqlxUserRepository::new(pool.clone());
    let mut new = NewUser::standard(email);
    new.tier = tier;
    repo.create_user(new, Utc::now()).await.unwrap()
}

pub async fn seed_actor(pool: &AnyPool, email: &str, tier: AccountTier) -> Actor {
    let (user, profile) = seed_user(pool, email, tier).await;
    Actor::from_user(&user, &profile)
}

pub async fn seed_stock(pool: &AnyPool, symbol: &str) -> Stock {
    let repo = SqlxStockRepository::new(pool.clone());
    repo.create(NewStock::new(symbol, format!("{symbol} Corp"), "NASDAQ"), Utc::now())
        .await
        .unwrap()
}

pub fn price_store(pool: &AnyPool) -> Arc<PriceStore> {
    Arc::new(PriceStore::new(
        Arc::new(SqlxPriceRepository::new(pool.clone())),
        Arc::new(InMemoryCache::new()),
        Duration::from_secs(300),
    ))
}

pub async fn record_price(prices: &PriceStore, stock_id: Uuid, price: Decimal, ts: DateTime<Utc>) {
    let new = NewPrice {
        stock_id,
        price,
        volume: 1_000,
        source: PriceSource::AlphaVantage,
        timestamp: ts,
    };
    prices.record(&new, ts).await.unwrap();
}

/// Scripted quote provider.
#[derive(Default)]
pub struct MockProvider {
    quotes: Mutex<HashMap<String, Result<QuoteFetch, String>>>,
    series: Mutex<HashMap<String, Vec<DailyBar>>>,
    pub quote_calls: AtomicU32,
}

impl MockProvider {
    pub fn set_quote(&self, symbol: &str, fetch: QuoteFetch) {
        self.quotes.lock().insert(symbol.to_string(), Ok(fetch));
    }

    pub fn set_failure(&self, symbol: &str, msg: &str) {
        self.quotes.lock().insert(symbol.to_string(), Err(msg.to_string()));
    }

    pub fn set_series(&self, symbol: &str, bars: Vec<DailyBar>) {
        self.series.lock().insert(symbol.to_string(), bars);
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteFetch, QuoteError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        match self.quotes.lock().get(symbol) {
            Some(Ok(fetch)) => Ok(fetch.clone()),
            Some(Err(msg)) => Err(QuoteError::Malformed(msg.clone())),
            None => Err(QuoteError::Timeout),
        }
    }

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, QuoteError> {
        Ok(self
            .series
            .lock()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.date >= from && b.date <= to)
            .collect())
    }
}

/// Mailer that fails its first `fail_first` sends (or every send to
/// `always_fail_to`) and records every attempt.
#[derive(Default)]
pub struct MockMailer {
    fail_first: u32,
    always_fail_to: Option<String>,
    pub attempts: AtomicU32,
    pub delivered: Mutex<Vec<OutgoingEmail>>,
}

impl MockMailer {
    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn failing_for(address: &str) -> Self {
        Self {
            always_fail_to: Some(address.to_string()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first || self.always_fail_to.as_deref() == Some(email.to.as_str()) {
            return Err(DeliveryError::Timeout);
        }
        self.delivered.lock().push(email.clone());
        Ok(())
    }
}
