use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{AccountTier, NewUser, Profile, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates the user and its profile as one unit.
    async fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> Result<(User, Profile)>;

    async fn fetch_by_id(&self, user_id: &Uuid) -> Result<Option<User>>;

    async fn fetch_profile(&self, user_id: &Uuid) -> Result<Option<Profile>>;

    /// Active users among `ids`; unknown or deactivated ids are dropped.
    async fn fetch_active_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// Changes the tier and its derived watchlist allowance together.
    async fn set_tier(&self, user_id: &Uuid, tier: AccountTier, now: DateTime<Utc>) -> Result<()>;

    async fn soft_delete(&self, user_id: &Uuid) -> Result<()>;
}
