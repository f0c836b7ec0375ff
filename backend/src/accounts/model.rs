use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountTier {
    Standard,
    Premium,
    Admin,
}

impl AccountTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Premium => "PREMIUM",
            Self::Admin => "ADMIN",
        }
    }

    /// Watchlist allowance that comes with the tier.
    pub fn max_watchlists(self) -> u32 {
        match self {
            Self::Standard => 1,
            Self::Premium => 10,
            Self::Admin => 999,
        }
    }
}

impl fmt::Display for AccountTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(Self::Standard),
            "PREMIUM" => Ok(Self::Premium),
            "ADMIN" => Ok(Self::Admin),
            other => Err(anyhow!("unknown account tier: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Per-user preferences. Created in the same step as the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub account_tier: AccountTier,
    pub timezone: String,
    pub preferred_currency: String,
    /// Always derived from `account_tier`.
    pub max_watchlists: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub tier: AccountTier,
}

impl NewUser {
    pub fn standard(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            is_superuser: false,
            tier: AccountTier::Standard,
        }
    }
}

/// Lower-cases the domain part; the local part is kept as given.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingEmail);
    }

    let Some((local, domain)) = trimmed.rsplit_once('@') else {
        return Err(ValidationError::InvalidEmail(trimmed.to_string()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::InvalidEmail(trimmed.to_string()));
    }

    Ok(format!("{local}@{}", domain.to_lowercase()))
}
