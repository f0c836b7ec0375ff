pub mod backfill;
pub mod ingest;
pub mod model;
pub mod provider;
pub mod repository;
pub mod repository_sqlx;
pub mod retention;
pub mod store;

pub use model::{InsertOutcome, NewPrice, PriceRecord, PriceSource, PriceStatistics};
pub use repository::PriceRepository;
pub use repository_sqlx::SqlxPriceRepository;
pub use store::PriceStore;
