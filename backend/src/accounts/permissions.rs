//! Access rules as plain predicates over role and ownership values.
//!
//! Nothing here touches storage: callers resolve the acting user's role and
//! the resource owner first, then ask.

use uuid::Uuid;

use super::model::{AccountTier, Profile, User};
use crate::error::AccessError;

/// Standard accounts may query this many days of price history.
pub const STANDARD_HISTORY_DAYS: i64 = 30;

/// The acting user, reduced to what access decisions need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub tier: AccountTier,
}

impl Actor {
    pub fn from_user(user: &User, profile: &Profile) -> Self {
        Self {
            user_id: user.id,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            tier: profile.account_tier,
        }
    }
}

pub fn is_admin(actor: &Actor) -> bool {
    actor.is_staff || actor.is_superuser
}

pub fn is_owner_or_admin(actor: &Actor, owner_id: Uuid) -> bool {
    is_admin(actor) || actor.user_id == owner_id
}

pub fn is_premium_or_admin(actor: &Actor) -> bool {
    is_admin(actor) || matches!(actor.tier, AccountTier::Premium | AccountTier::Admin)
}

/// Stock master data: everyone reads, only admins write.
pub fn can_write_master_data(actor: &Actor) -> bool {
    is_admin(actor)
}

pub fn can_create_watchlist(actor: &Actor, current_count: u32) -> bool {
    is_admin(actor) || current_count < actor.tier.max_watchlists()
}

/// Empty or negative windows are never granted.
pub fn can_access_history(actor: &Actor, requested_days: i64) -> bool {
    requested_days > 0 && (requested_days <= STANDARD_HISTORY_DAYS || is_premium_or_admin(actor))
}

pub fn ensure_owner_or_admin(actor: &Actor, owner_id: Uuid) -> Result<(), AccessError> {
    if is_owner_or_admin(actor, owner_id) {
        Ok(())
    } else {
        Err(AccessError::NotOwner)
    }
}

pub fn ensure_master_data_write(actor: &Actor) -> Result<(), AccessError> {
    if can_write_master_data(actor) {
        Ok(())
    } else {
        Err(AccessError::AdminRequired)
    }
}

pub fn ensure_can_create_watchlist(actor: &Actor, current_count: u32) -> Result<(), AccessError> {
    if can_create_watchlist(actor, current_count) {
        Ok(())
    } else {
        Err(AccessError::WatchlistLimit {
            max: actor.tier.max_watchlists(),
        })
    }
}

pub fn ensure_history_access(actor: &Actor, requested_days: i64) -> Result<(), AccessError> {
    if can_access_history(actor, requested_days) {
        Ok(())
    } else {
        Err(AccessError::HistoryLimit {
            max_days: STANDARD_HISTORY_DAYS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(tier: AccountTier) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            is_staff: false,
            is_superuser: false,
            tier,
        }
    }

    fn staff() -> Actor {
        Actor {
            is_staff: true,
            ..actor(AccountTier::Standard)
        }
    }

    #[test]
    fn owners_and_admins_pass_ownership_check() {
        let a = actor(AccountTier::Standard);
        assert!(is_owner_or_admin(&a, a.user_id));
        assert!(!is_owner_or_admin(&a, Uuid::new_v4()));
        assert!(is_owner_or_admin(&staff(), Uuid::new_v4()));
        assert_eq!(
            ensure_owner_or_admin(&a, Uuid::new_v4()),
            Err(AccessError::NotOwner)
        );
    }

    #[test]
    fn premium_gate() {
        assert!(!is_premium_or_admin(&actor(AccountTier::Standard)));
        assert!(is_premium_or_admin(&actor(AccountTier::Premium)));
        assert!(is_premium_or_admin(&actor(AccountTier::Admin)));
        assert!(is_premium_or_admin(&staff()));
    }

    #[test]
    fn master_data_writes_are_admin_only() {
        assert!(!can_write_master_data(&actor(AccountTier::Premium)));
        assert!(can_write_master_data(&staff()));
        assert_eq!(
            ensure_master_data_write(&actor(AccountTier::Admin)),
            Err(AccessError::AdminRequired)
        );
    }

    #[test]
    fn watchlist_allowance_follows_tier() {
        let standard = actor(AccountTier::Standard);
        assert!(can_create_watchlist(&standard, 0));
        assert!(!can_create_watchlist(&standard, 1));
        assert_eq!(
            ensure_can_create_watchlist(&standard, 1),
            Err(AccessError::WatchlistLimit { max: 1 })
        );

        let premium = actor(AccountTier::Premium);
        assert!(can_create_watchlist(&premium, 9));
        assert!(!can_create_watchlist(&premium, 10));

        // Staff bypass the tier limit.
        assert!(can_create_watchlist(&staff(), 50));
    }

    #[test]
    fn history_window() {
        let standard = actor(AccountTier::Standard);
        assert!(can_access_history(&standard, 30));
        assert!(!can_access_history(&standard, 31));
        assert!(ensure_history_access(&standard, 90).is_err());
        assert!(can_access_history(&actor(AccountTier::Premium), 3650));
    }

    #[test]
    fn empty_or_negative_history_is_never_granted() {
        assert!(!can_access_history(&actor(AccountTier::Standard), 0));
        assert!(!can_access_history(&actor(AccountTier::Premium), -5));
        assert!(!can_access_history(&staff(), i64::MIN));
    }
}
