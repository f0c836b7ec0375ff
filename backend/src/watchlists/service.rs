use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::model::{Watchlist, WatchlistEntry, WatchlistItem};
use super::repository::WatchlistRepository;
use crate::accounts::Actor;
use crate::accounts::permissions::{ensure_can_create_watchlist, ensure_owner_or_admin};
use crate::pricing::PriceStore;

/// Watchlist operations on behalf of an [`Actor`]: tier limits on
/// creation, owner-or-admin on everything that touches an existing list.
pub struct WatchlistService {
    watchlists: Arc<dyn WatchlistRepository>,
    prices: Arc<PriceStore>,
}

impl WatchlistService {
    pub fn new(watchlists: Arc<dyn WatchlistRepository>, prices: Arc<PriceStore>) -> Self {
        Self { watchlists, prices }
    }

    pub async fn create_watchlist(&self, actor: &Actor, name: &str, now: DateTime<Utc>) -> Result<Watchlist> {
        let admit = |count| ensure_can_create_watchlist(actor, count);
        self.watchlists.create(&actor.user_id, name, &admit, now).await
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Watchlist>> {
        self.watchlists.list_for_user(&actor.user_id).await
    }

    pub async fn set_default(&self, actor: &Actor, watchlist_id: &Uuid, now: DateTime<Utc>) -> Result<()> {
        self.owned(actor, watchlist_id).await?;
        self.watchlists.set_default(watchlist_id, now).await
    }

    pub async fn delete_watchlist(&self, actor: &Actor, watchlist_id: &Uuid) -> Result<()> {
        self.owned(actor, watchlist_id).await?;
        self.watchlists.delete(watchlist_id).await?;
        Ok(())
    }

    pub async fn add_stock(
        &self,
        actor: &Actor,
        watchlist_id: &Uuid,
        stock_id: &Uuid,
        alert_thresholds: Option<Value>,
        now: DateTime<Utc>,
    ) -> Result<WatchlistItem> {
        self.owned(actor, watchlist_id).await?;
        let thresholds = alert_thresholds.unwrap_or_else(|| Value::Object(Default::default()));
        self.watchlists.add_item(watchlist_id, stock_id, thresholds, now).await
    }

    pub async fn remove_stock(&self, actor: &Actor, watchlist_id: &Uuid, stock_id: &Uuid) -> Result<bool> {
        self.owned(actor, watchlist_id).await?;
        self.watchlists.remove_item(watchlist_id, stock_id).await
    }

    /// The list's stocks with their latest prices. A failed price lookup
    /// shows the stock without a price instead of failing the listing.
    pub async fn entries(&self, actor: &Actor, watchlist_id: &Uuid) -> Result<Vec<WatchlistEntry>> {
        self.owned(actor, watchlist_id).await?;

        let items = self.watchlists.list_items(watchlist_id).await?;
        let mut out = Vec::with_capacity(items.len());
        for (item, stock) in items {
            let latest_price = match self.prices.latest_price(&stock.id).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(stock = %stock.symbol, error = ?e, "latest price unavailable");
                    None
                }
            };
            out.push(WatchlistEntry {
                item,
                stock,
                latest_price,
            });
        }
        Ok(out)
    }

    async fn owned(&self, actor: &Actor, watchlist_id: &Uuid) -> Result<Watchlist> {
        let wl = self
            .watchlists
            .fetch_by_id(watchlist_id)
            .await?
            .ok_or_else(|| anyhow!("watchlist {watchlist_id} not found"))?;
        ensure_owner_or_admin(actor, wl.user_id)?;
        Ok(wl)
    }
}
