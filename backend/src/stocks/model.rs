use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Longest price-history window any caller may request.
pub const MAX_HISTORY_DAYS: i64 = 3650;

/// Stock master data. Prices live in the price store, keyed by `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: Uuid,
    /// Upper-case ticker, unique.
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub sector: String,
    pub industry: String,
    /// Millions, when known.
    pub market_cap: Option<u64>,
    /// Delisted stocks are deactivated, never removed.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewStock {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: Option<u64>,
}

impl NewStock {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: exchange.into(),
            currency: "USD".to_string(),
            sector: String::new(),
            industry: String::new(),
            market_cap: None,
        }
    }
}

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn validate_history_days(days: i64) -> Result<(), ValidationError> {
    if (1..=MAX_HISTORY_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::HistoryWindow {
            got: days,
            max: MAX_HISTORY_DAYS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_days_bounds() {
        assert!(validate_history_days(1).is_ok());
        assert!(validate_history_days(MAX_HISTORY_DAYS).is_ok());
        assert!(validate_history_days(0).is_err());
        assert!(validate_history_days(-1).is_err());
        assert_eq!(
            validate_history_days(i64::MAX),
            Err(ValidationError::HistoryWindow {
                got: i64::MAX,
                max: MAX_HISTORY_DAYS
            })
        );
    }
}
