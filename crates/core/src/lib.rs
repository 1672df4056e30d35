//! Core types and traits for oddjobz
//!
//! This crate defines the foundational types used throughout the system:
//! - UserId / ActivityId: identifiers embedded in store keys
//! - Activity: immutable published activity and its stored encoding
//! - StoreValue: typed values held by the key-value store
//! - keys: the store key layout shared by every component
//! - Traits: KeyValueStore, Script, ScriptContext
//! - MarketError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;
pub mod value;

pub use activity::{Activity, ActivityKind, NewActivity};
pub use error::{MarketError, MarketResult};
pub use traits::{KeyValueStore, Script, ScriptContext, ScriptExt};
pub use types::{ActivityId, UserId, MAX_USER_ID_LENGTH};
pub use value::StoreValue;
