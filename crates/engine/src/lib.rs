//! Engine layer for oddjobz
//!
//! Builds the marketplace core on top of any `KeyValueStore`:
//! - Credit ledger with race-free debit
//! - Follow graph with symmetric edges
//! - Fan-out-on-write timelines and their paginated reader
//! - `oddjobz.toml` configuration and the `Marketplace` facade

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod marketplace;
pub mod primitives;

pub use marketplace::{MarketConfig, Marketplace, CONFIG_FILE_NAME};
pub use primitives::{
    parse_amount, CreditLedger, FollowCounts, FollowGraph, FollowState, LedgerEntry,
    LedgerEntryKind, Pages, PublishReceipt, TimelineFanoutEngine, TimelinePage, TimelineReader,
    DEFAULT_FANOUT_BATCH,
};
