//! Identifier types
//!
//! - UserId: resolved principal handed to the core by the auth middleware
//! - ActivityId: globally monotonic identifier assigned at publish time

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a user identifier
pub const MAX_USER_ID_LENGTH: usize = 128;

/// Identifier of a marketplace user
///
/// User ids are embedded in store keys (`users:{id}:timeline`), so they must
/// be non-empty and free of the `:` separator and whitespace. Two distinct
/// users can therefore never map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap a user identifier
    pub fn new(id: impl Into<String>) -> MarketResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(MarketError::invalid_input("user id cannot be empty"));
        }
        if id.len() > MAX_USER_ID_LENGTH {
            return Err(MarketError::invalid_input(format!(
                "user id exceeds {} bytes",
                MAX_USER_ID_LENGTH
            )));
        }
        if id.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(MarketError::invalid_input(format!(
                "user id '{}' contains ':' or whitespace",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = MarketError;

    fn try_from(s: String) -> MarketResult<Self> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a published activity
///
/// Allocated by a single atomic increment of a shared counter, so ids are
/// totally ordered across all authors. Ids start at 1. Gaps are possible
/// (an allocation whose publish failed is burned) and are never compacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(u64);

impl ActivityId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivityId {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        s.parse::<u64>()
            .map(ActivityId)
            .map_err(|_| MarketError::Serialization(format!("invalid activity id '{}'", s)))
    }
}

impl From<u64> for ActivityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_id_accepts_plain_names() {
        let id = UserId::new("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }

    #[test]
    fn test_user_id_rejects_empty() {
        assert!(matches!(
            UserId::new(""),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_user_id_rejects_separator() {
        assert!(UserId::new("alice:credits").is_err());
        assert!(UserId::new("al ice").is_err());
    }

    #[test]
    fn test_user_id_rejects_oversized() {
        let long = "a".repeat(MAX_USER_ID_LENGTH + 1);
        assert!(UserId::new(long).is_err());
    }

    #[test]
    fn test_user_id_serde_validates() {
        let ok: UserId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(ok.as_str(), "bob");
        let bad: Result<UserId, _> = serde_json::from_str("\"b:ob\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_activity_id_parse() {
        assert_eq!("42".parse::<ActivityId>().unwrap(), ActivityId::new(42));
        assert!(matches!(
            "x".parse::<ActivityId>(),
            Err(MarketError::Serialization(_))
        ));
    }

    #[test]
    fn test_activity_id_serializes_as_number() {
        let json = serde_json::to_string(&ActivityId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    proptest! {
        #[test]
        fn prop_activity_id_display_parses_back(n in any::<u64>()) {
            let id = ActivityId::new(n);
            prop_assert_eq!(id.to_string().parse::<ActivityId>().unwrap(), id);
        }

        #[test]
        fn prop_valid_user_ids_never_contain_separator(s in "[a-zA-Z0-9_.-]{1,64}") {
            let id = UserId::new(s.clone()).unwrap();
            prop_assert!(!id.as_str().contains(':'));
            prop_assert_eq!(id.as_str(), s.as_str());
        }
    }
}
