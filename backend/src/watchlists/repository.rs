use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::model::{Watchlist, WatchlistItem};
use crate::error::AccessError;
use crate::stocks::Stock;

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// The user's first watchlist becomes the default. `admit` sees the
    /// user's current count inside the same transaction as the insert.
    async fn create(
        &self,
        user_id: &Uuid,
        name: &str,
        admit: &(dyn Fn(u32) -> Result<(), AccessError> + Sync),
        now: DateTime<Utc>,
    ) -> Result<Watchlist>;

    async fn fetch_by_id(&self, watchlist_id: &Uuid) -> Result<Option<Watchlist>>;

    /// Default first, then by name.
    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Watchlist>>;

    /// Makes `watchlist_id` the owner's only default.
    async fn set_default(&self, watchlist_id: &Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Deletes the watchlist and its items.
    async fn delete(&self, watchlist_id: &Uuid) -> Result<bool>;

    /// Rejects inactive stocks and stocks already on the list.
    async fn add_item(
        &self,
        watchlist_id: &Uuid,
        stock_id: &Uuid,
        alert_thresholds: Value,
        now: DateTime<Utc>,
    ) -> Result<WatchlistItem>;

    async fn remove_item(&self, watchlist_id: &Uuid, stock_id: &Uuid) -> Result<bool>;

    /// Items with their stocks, ordered by symbol.
    async fn list_items(&self, watchlist_id: &Uuid) -> Result<Vec<(WatchlistItem, Stock)>>;
}
