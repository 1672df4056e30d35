//! Store key layout
//!
//! All keys are built here so the ledger, follow graph and fan-out engine
//! agree on naming.
//!
//! | Key | Shape | Owner |
//! |-----|-------|-------|
//! | `users:{user}:credits` | int | CreditLedger |
//! | `users:{user}:transactions` | list | CreditLedger |
//! | `users:{user}:followers` | set | FollowGraph |
//! | `users:{user}:following` | set | FollowGraph |
//! | `users:{user}:timeline` | list | TimelineFanoutEngine |
//! | `global:timeline` | list | TimelineFanoutEngine |
//! | `activity:next_id` | int | TimelineFanoutEngine |
//! | `activity:{id}` | string | TimelineFanoutEngine |

use crate::types::{ActivityId, UserId};

/// Counter allocating activity ids
pub const ACTIVITY_COUNTER: &str = "activity:next_id";

/// Timeline aggregating every activity in the system
pub const GLOBAL_TIMELINE: &str = "global:timeline";

/// Prefix shared by all activity payload keys
pub const ACTIVITY_PREFIX: &str = "activity:";

/// Credit balance of a user
pub fn credits(user: &UserId) -> String {
    format!("users:{}:credits", user)
}

/// Ledger history of a user, newest-first
pub fn transactions(user: &UserId) -> String {
    format!("users:{}:transactions", user)
}

/// Users following `user`
pub fn followers(user: &UserId) -> String {
    format!("users:{}:followers", user)
}

/// Users `user` follows
pub fn following(user: &UserId) -> String {
    format!("users:{}:following", user)
}

/// Timeline of `user`, newest-first
pub fn timeline(user: &UserId) -> String {
    format!("users:{}:timeline", user)
}

/// Stored payload of an activity
pub fn activity(id: ActivityId) -> String {
    format!("{}{}", ACTIVITY_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_keys() {
        let alice = UserId::new("alice").unwrap();
        assert_eq!(credits(&alice), "users:alice:credits");
        assert_eq!(transactions(&alice), "users:alice:transactions");
        assert_eq!(followers(&alice), "users:alice:followers");
        assert_eq!(following(&alice), "users:alice:following");
        assert_eq!(timeline(&alice), "users:alice:timeline");
    }

    #[test]
    fn test_activity_key_does_not_collide_with_counter() {
        assert_eq!(activity(ActivityId::new(12)), "activity:12");
        assert_ne!(activity(ActivityId::new(1)), ACTIVITY_COUNTER);
    }
}
