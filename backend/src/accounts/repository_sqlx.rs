use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::model::{AccountTier, NewUser, Profile, User, normalize_email};
use super::repository::UserRepository;
use crate::db::convert::{enum_col, flag, flag_col, i64_to_u64, uuid_col};
use crate::error::ValidationError;
use crate::time::{from_ms, to_ms};

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_CURRENCY: &str = "USD";

/// SQLx-backed implementation of UserRepository.
pub struct SqlxUserRepository {
    pool: AnyPool,
}

impl SqlxUserRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    #[instrument(skip(self, new), target = "accounts")]
    async fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> anyhow::Result<(User, Profile)> {
        let email = normalize_email(&new.email)?;
        let now_ms = to_ms(now);

        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query("SELECT 1 AS one FROM users WHERE email = ?;")
            .bind(email.clone())
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(ValidationError::DuplicateEmail(email).into());
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            is_active: true,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            date_joined: from_ms(now_ms)?,
        };

        sqlx::query(
            r#"
INSERT INTO users
  (user_id, email, first_name, last_name, is_active, is_staff, is_superuser, date_joined_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(user.id.to_string())
        .bind(user.email.clone())
        .bind(user.first_name.clone())
        .bind(user.last_name.clone())
        .bind(flag(user.is_active))
        .bind(flag(user.is_staff))
        .bind(flag(user.is_superuser))
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .context("insert user")?;

        // The profile is part of user creation, not a side effect of it.
        let profile = Profile {
            user_id: user.id,
            account_tier: new.tier,
            timezone: DEFAULT_TIMEZONE.to_string(),
            preferred_currency: DEFAULT_CURRENCY.to_string(),
            max_watchlists: new.tier.max_watchlists(),
            created_at: user.date_joined,
            updated_at: user.date_joined,
        };

        sqlx::query(
            r#"
INSERT INTO profiles
  (user_id, account_tier, timezone, preferred_currency, max_watchlists, created_ms, updated_ms)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(profile.user_id.to_string())
        .bind(profile.account_tier.as_str())
        .bind(profile.timezone.clone())
        .bind(profile.preferred_currency.clone())
        .bind(i64::from(profile.max_watchlists))
        .bind(now_ms)
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .context("insert profile")?;

        tx.commit().await?;

        info!(user_id = %user.id, tier = %profile.account_tier, "user created with profile");
        Ok((user, profile))
    }

    async fn fetch_by_id(&self, user_id: &Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE user_id = ?;"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn fetch_profile(&self, user_id: &Uuid) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
SELECT user_id, account_tier, timezone, preferred_currency, max_watchlists, created_ms, updated_ms
FROM profiles
WHERE user_id = ?;
"#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn fetch_active_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{SELECT_USER} WHERE is_active = 1 AND user_id IN ({placeholders});");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id.to_string());
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_user(&r) {
                Ok(u) => out.push(u),
                Err(e) => warn!(error = %e, "skipping malformed user row"),
            }
        }
        Ok(out)
    }

    async fn set_tier(
        &self,
        user_id: &Uuid,
        tier: AccountTier,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
UPDATE profiles
SET account_tier = ?, max_watchlists = ?, updated_ms = ?
WHERE user_id = ?;
"#,
        )
        .bind(tier.as_str())
        .bind(i64::from(tier.max_watchlists()))
        .bind(to_ms(now))
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(anyhow!("profile not found for user {user_id}"));
        }
        Ok(())
    }

    async fn soft_delete(&self, user_id: &Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_active = 0 WHERE user_id = ?;")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const SELECT_USER: &str = r#"
SELECT user_id, email, first_name, last_name, is_active, is_staff, is_superuser, date_joined_ms
FROM users"#;

fn row_to_user(r: &sqlx::any::AnyRow) -> anyhow::Result<User> {
    Ok(User {
        id: uuid_col(r, "user_id")?,
        email: r.try_get("email")?,
        first_name: r.try_get("first_name")?,
        last_name: r.try_get("last_name")?,
        is_active: flag_col(r, "is_active")?,
        is_staff: flag_col(r, "is_staff")?,
        is_superuser: flag_col(r, "is_superuser")?,
        date_joined: from_ms(r.try_get("date_joined_ms")?)?,
    })
}

fn row_to_profile(r: &sqlx::any::AnyRow) -> anyhow::Result<Profile> {
    let max = i64_to_u64(r.try_get("max_watchlists")?)?;
    Ok(Profile {
        user_id: uuid_col(r, "user_id")?,
        account_tier: enum_col(r, "account_tier")?,
        timezone: r.try_get("timezone")?,
        preferred_currency: r.try_get("preferred_currency")?,
        max_watchlists: u32::try_from(max).context("max_watchlists out of range")?,
        created_at: from_ms(r.try_get("created_ms")?)?,
        updated_at: from_ms(r.try_get("updated_ms")?)?,
    })
}
