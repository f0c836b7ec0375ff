use thiserror::Error;

/// Rejected input on a user-facing write path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email address is required")]
    MissingEmail,

    #[error("email address is malformed: {0}")]
    InvalidEmail(String),

    #[error("email address already registered: {0}")]
    DuplicateEmail(String),

    #[error("threshold must be greater than zero")]
    NonPositiveThreshold,

    #[error("percent change threshold cannot exceed 100")]
    PercentOutOfRange,

    #[error("stock not found or inactive: {0}")]
    UnknownStock(String),

    #[error("symbol is already registered: {0}")]
    DuplicateSymbol(String),

    #[error("watchlist name must not be empty")]
    EmptyName,

    #[error("a watchlist named {0:?} already exists")]
    DuplicateWatchlist(String),

    #[error("stock is already in this watchlist")]
    DuplicateWatchlistItem,

    #[error("volume must not be negative")]
    NegativeVolume,

    #[error("price must be greater than zero")]
    NonPositivePrice,

    #[error("history window must be between 1 and {max} days, got {got}")]
    HistoryWindow { got: i64, max: i64 },
}

/// Denied by a permission predicate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("not the owner of this resource")]
    NotOwner,

    #[error("your account tier allows at most {max} watchlist(s)")]
    WatchlistLimit { max: u32 },

    #[error("access to historical data beyond {max_days} days requires a Premium account")]
    HistoryLimit { max_days: i64 },

    #[error("administrator privileges required")]
    AdminRequired,
}
