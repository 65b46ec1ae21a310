use crate::domain::user::UserRecord;
use crate::storage;
use sqlx::PgPool;

/// Free analyses per identity before a subscription is required.
pub const FREE_QUOTA: i32 = 5;

/// Pure half of the gate: what to do for a given user snapshot. The
/// authoritative consume happens as a conditional write, so a stale snapshot
/// can at worst turn `TryConsume` into a losing write, never an over-grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Subscribed users are unmetered; the counter is left untouched.
    Unmetered,
    /// Under quota: attempt the atomic increment.
    TryConsume,
    /// At or over quota with no subscription.
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Granted; for metered users carries the post-increment count.
    Granted { usage_count: Option<i32> },
    Denied,
}

pub fn decide(user: &UserRecord) -> GateDecision {
    if user.is_subscribed {
        GateDecision::Unmetered
    } else if user.usage_count >= FREE_QUOTA {
        GateDecision::Deny
    } else {
        GateDecision::TryConsume
    }
}

/// Check-and-consume against the quota. Must complete before any dispatch; a
/// `Denied` outcome short-circuits the request entirely.
pub async fn check_and_consume(pool: &PgPool, user: &UserRecord) -> anyhow::Result<Outcome> {
    match decide(user) {
        GateDecision::Unmetered => Ok(Outcome::Granted { usage_count: None }),
        GateDecision::Deny => Ok(Outcome::Denied),
        GateDecision::TryConsume => {
            // Conditional increment: two racing requests cannot both take the
            // last free slot.
            match storage::users::try_consume_quota(pool, &user.id, FREE_QUOTA).await? {
                Some(usage_count) => Ok(Outcome::Granted {
                    usage_count: Some(usage_count),
                }),
                None => Ok(Outcome::Denied),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn user(is_subscribed: bool, usage_count: i32) -> UserRecord {
        UserRecord {
            id: "user-1".to_string(),
            email: None,
            display_name: None,
            is_anonymous: false,
            is_subscribed,
            usage_count,
            stripe_customer_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn subscribed_users_are_unmetered_at_any_count() {
        for count in [0, FREE_QUOTA, FREE_QUOTA + 10] {
            assert_eq!(decide(&user(true, count)), GateDecision::Unmetered);
        }
    }

    #[test]
    fn under_quota_consumes() {
        for count in 0..FREE_QUOTA {
            assert_eq!(decide(&user(false, count)), GateDecision::TryConsume);
        }
    }

    #[test]
    fn at_quota_denies() {
        assert_eq!(decide(&user(false, FREE_QUOTA)), GateDecision::Deny);
        assert_eq!(decide(&user(false, FREE_QUOTA + 1)), GateDecision::Deny);
    }
}
