//! Typed values held by the key-value store
//!
//! The store distinguishes four value shapes, matching the capability set the
//! ledger and fan-out engine rely on: integer counters, opaque strings,
//! ordered lists and unordered sets. Operations check the shape of the value
//! they touch and fail with `WrongType` on a mismatch instead of coercing.

use crate::error::MarketError;
use std::collections::{HashSet, VecDeque};

/// Value stored under a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// Integer scalar (counters, balances)
    Int(i64),
    /// String scalar (serialized payloads)
    Str(String),
    /// Ordered list, index 0 is the head
    List(VecDeque<String>),
    /// Unordered set of members
    Set(HashSet<String>),
}

impl StoreValue {
    /// Name of the value shape, used in `WrongType` errors
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Int(_) => "int",
            StoreValue::Str(_) => "string",
            StoreValue::List(_) => "list",
            StoreValue::Set(_) => "set",
        }
    }

    /// Build the `WrongType` error for an operation expecting `expected`
    pub fn wrong_type(&self, key: &str, expected: &'static str) -> MarketError {
        MarketError::WrongType {
            key: key.to_string(),
            expected,
            found: self.type_name(),
        }
    }

    /// Returns the integer value, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StoreValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string value, if this is a `Str`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is an empty collection (such keys are dropped)
    pub fn is_empty_collection(&self) -> bool {
        match self {
            StoreValue::List(l) => l.is_empty(),
            StoreValue::Set(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<i64> for StoreValue {
    fn from(i: i64) -> Self {
        StoreValue::Int(i)
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        StoreValue::Str(s)
    }
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        StoreValue::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(StoreValue::Int(1).type_name(), "int");
        assert_eq!(StoreValue::from("x").type_name(), "string");
        assert_eq!(StoreValue::List(VecDeque::new()).type_name(), "list");
        assert_eq!(StoreValue::Set(HashSet::new()).type_name(), "set");
    }

    #[test]
    fn test_wrong_type_error_names_both_shapes() {
        let err = StoreValue::Int(3).wrong_type("k", "list");
        match err {
            MarketError::WrongType {
                key,
                expected,
                found,
            } => {
                assert_eq!(key, "k");
                assert_eq!(expected, "list");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_accessors() {
        assert_eq!(StoreValue::Int(5).as_int(), Some(5));
        assert_eq!(StoreValue::from("x").as_int(), None);
        assert_eq!(StoreValue::from("x").as_str(), Some("x"));
    }

    #[test]
    fn test_empty_collection() {
        assert!(StoreValue::List(VecDeque::new()).is_empty_collection());
        assert!(!StoreValue::Int(0).is_empty_collection());
    }
}
