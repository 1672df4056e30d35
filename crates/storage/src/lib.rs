//! Storage layer for oddjobz
//!
//! This crate implements the in-process key-value store with:
//! - MemoryStore: DashMap key space with one timed mutex per key
//! - Atomic scripts: sorted lock acquisition, rollback journal on error
//! - Typed values: counters, strings, lists and sets
//! - Shutdown: a closed store refuses all work with `StoreUnavailable`
//! - Testing: fault injection for outage scenarios
//!
//! # Concurrency
//!
//! Scripts touching disjoint keys run in parallel. Scripts sharing a key are
//! serialized on that key's lock; every wait is bounded by the configured
//! lock timeout.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod context;
mod journal;
pub mod store;
pub mod testing;

pub use store::{MemoryStore, StoreOptions, StoreStats, DEFAULT_LOCK_TIMEOUT};
pub use testing::{Access, FaultPlan};
