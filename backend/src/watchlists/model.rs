use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::pricing::PriceRecord;
use crate::stocks::Stock;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Unique per user.
    pub name: String,
    /// At most one default watchlist per user.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: Uuid,
    pub watchlist_id: Uuid,
    pub stock_id: Uuid,
    /// Free-form per-item thresholds, e.g. `{"above": 200, "below": 150}`.
    pub alert_thresholds: Value,
    pub added_at: DateTime<Utc>,
}

/// One row of a rendered watchlist.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub item: WatchlistItem,
    pub stock: Stock,
    pub latest_price: Option<PriceRecord>,
}

pub fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}
