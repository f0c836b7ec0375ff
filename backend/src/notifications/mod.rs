//! Notification records and their delivery.

pub mod content;
pub mod dispatcher;
pub mod mailer;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod retention;

pub use dispatcher::{BulkSummary, NotificationDispatcher};
pub use mailer::{DeliveryError, HttpRelayMailer, LogMailer, Mailer, OutgoingEmail};
pub use model::{Channel, NotificationKind, NotificationRecord, NotificationStatus};
pub use repository::NotificationRepository;
pub use repository_sqlx::SqlxNotificationRepository;
