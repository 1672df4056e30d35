//! oddjobz - credit ledger and timeline fan-out core for a skills marketplace
//!
//! Users hold a credit balance, follow each other, and receive the activity
//! of the users they follow on a newest-first timeline.
//!
//! # Quick Start
//!
//! ```ignore
//! use oddjobz::{Marketplace, NewActivity, UserId};
//! use serde_json::json;
//!
//! let market = Marketplace::ephemeral();
//! let (alice, bob) = (UserId::new("alice")?, UserId::new("bob")?);
//!
//! market.ledger().credit(&alice, 50)?;
//! market.follows().follow(&alice, &bob)?;
//! let receipt = market.fanout().publish(NewActivity::review(bob, json!("great")))?;
//! let page = market.reader().page(&alice, 0, 10)?;
//! ```
//!
//! # Architecture
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `oddjobz-core` | ids, activities, key layout, store traits, errors |
//! | `oddjobz-storage` | `MemoryStore` with atomic scripts |
//! | `oddjobz-engine` | ledger, follow graph, fan-out, reader, config |
//!
//! Components depend only on the `KeyValueStore` trait; `MemoryStore` is the
//! in-process implementation.

pub use oddjobz_core::{
    keys, Activity, ActivityId, ActivityKind, KeyValueStore, MarketError, MarketResult,
    NewActivity, Script, ScriptContext, ScriptExt, StoreValue, UserId,
};
pub use oddjobz_engine::*;
pub use oddjobz_storage::{FaultPlan, MemoryStore, StoreOptions, StoreStats};
