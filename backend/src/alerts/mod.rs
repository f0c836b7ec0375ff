//! User-defined price alerts and their periodic evaluation.

pub mod condition;
pub mod evaluator;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service;

pub use evaluator::{AlertEvaluator, EvaluationSummary};
pub use model::{Alert, AlertContext, ConditionType, NewAlert};
pub use repository::AlertRepository;
pub use repository_sqlx::SqlxAlertRepository;
pub use service::AlertService;
