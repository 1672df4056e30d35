//! Marketplace components as stateless facades over the store
//!
//! - **CreditLedger**: per-user balances with atomic debit, credit and transfer
//! - **FollowGraph**: symmetric follower/following edges
//! - **TimelineFanoutEngine**: id allocation, payload persistence and fan-out
//! - **TimelineReader**: paginated timeline reads
//!
//! ## Design Principle: Stateless Facades
//!
//! Each component holds only an `Arc<dyn KeyValueStore>` and its settings.
//! Counters, balances and timelines live in the store, so any number of
//! component instances, in any number of processes, can share one store.
//! Every multi-step mutation is one script; no lock exists outside the store.

pub mod fanout;
pub mod follow;
pub mod ledger;
pub mod timeline;

pub use fanout::{PublishReceipt, TimelineFanoutEngine, DEFAULT_FANOUT_BATCH};
pub use follow::{FollowCounts, FollowGraph, FollowState};
pub use ledger::{parse_amount, CreditLedger, LedgerEntry, LedgerEntryKind};
pub use timeline::{Pages, TimelinePage, TimelineReader};
