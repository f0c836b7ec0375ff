pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service;

pub use model::{MAX_HISTORY_DAYS, NewStock, Stock};
pub use repository::StockRepository;
pub use repository_sqlx::SqlxStockRepository;
pub use service::StockCatalog;
