pub mod model;
pub mod permissions;
pub mod repository;
pub mod repository_sqlx;

pub use model::{AccountTier, NewUser, Profile, User};
pub use permissions::Actor;
pub use repository::UserRepository;
pub use repository_sqlx::SqlxUserRepository;
