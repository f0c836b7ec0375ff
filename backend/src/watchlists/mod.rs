pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service;

pub use model::{Watchlist, WatchlistEntry, WatchlistItem};
pub use repository::WatchlistRepository;
pub use repository_sqlx::SqlxWatchlistRepository;
pub use service::WatchlistService;
