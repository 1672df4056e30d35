//! Marketplace: the components wired over one store
//!
//! ## Open Modes
//!
//! | Method | Config file | Store |
//! |--------|-------------|-------|
//! | `open(dir)` | `dir/oddjobz.toml`, created with defaults if missing | `MemoryStore` |
//! | `open_with_config(cfg)` | none | `MemoryStore` |
//! | `ephemeral()` | none, defaults | `MemoryStore` |
//! | `with_store(store, cfg)` | none | any `KeyValueStore` |
//!
//! # Example
//!
//! ```ignore
//! let market = Marketplace::open("/var/lib/oddjobz")?;
//! market.follows().follow(&alice, &bob)?;
//! market.fanout().publish(NewActivity::review(bob, json!("great")))?;
//! let page = market.reader().page(&alice, 0, 10)?;
//! ```

mod config;

pub use config::{
    FanoutSection, MarketConfig, ReaderSection, StoreSection, TimelineSection, CONFIG_FILE_NAME,
};

use crate::primitives::{CreditLedger, FollowGraph, TimelineFanoutEngine, TimelineReader};
use oddjobz_core::{KeyValueStore, MarketError, MarketResult};
use oddjobz_storage::{MemoryStore, StoreOptions};
use std::path::Path;
use std::sync::Arc;

/// Credit ledger, follow graph, fan-out engine and reader sharing one store
#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn KeyValueStore>,
    memory: Option<Arc<MemoryStore>>,
    config: MarketConfig,
    ledger: CreditLedger,
    follows: FollowGraph,
    fanout: TimelineFanoutEngine,
    reader: TimelineReader,
}

impl Marketplace {
    /// Open with the config file in `dir`, writing a default one if missing
    pub fn open<P: AsRef<Path>>(dir: P) -> MarketResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            MarketError::config(format!(
                "Failed to create config directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let config_path = dir.join(CONFIG_FILE_NAME);
        MarketConfig::write_default_if_missing(&config_path)?;
        let config = MarketConfig::from_file(&config_path)?;

        Self::open_with_config(config)
    }

    /// Open an in-memory store with an explicit configuration
    pub fn open_with_config(config: MarketConfig) -> MarketResult<Self> {
        config.validate()?;
        let memory = Arc::new(MemoryStore::with_options(
            StoreOptions::new().with_lock_timeout(config.lock_timeout()),
        ));
        let mut market = Self::wire(memory.clone(), config);
        market.memory = Some(memory);
        Ok(market)
    }

    /// In-memory marketplace with default settings
    pub fn ephemeral() -> Self {
        let config = MarketConfig::default();
        let memory = Arc::new(MemoryStore::with_options(
            StoreOptions::new().with_lock_timeout(config.lock_timeout()),
        ));
        let mut market = Self::wire(memory.clone(), config);
        market.memory = Some(memory);
        market
    }

    /// Wire the components over a caller-provided store
    ///
    /// The store's own lock timeout applies; `[store]` settings are ignored.
    pub fn with_store(store: Arc<dyn KeyValueStore>, config: MarketConfig) -> MarketResult<Self> {
        config.validate()?;
        Ok(Self::wire(store, config))
    }

    fn wire(store: Arc<dyn KeyValueStore>, config: MarketConfig) -> Self {
        tracing::info!(
            target: "oddjobz::store",
            lock_timeout_ms = config.store.lock_timeout_ms,
            batch_size = config.fanout.batch_size,
            max_len = ?config.timeline.max_len,
            "Marketplace opened"
        );
        Self {
            ledger: CreditLedger::new(store.clone()),
            follows: FollowGraph::new(store.clone()),
            fanout: TimelineFanoutEngine::from_config(store.clone(), &config),
            reader: TimelineReader::from_config(store.clone(), &config),
            memory: None,
            store,
            config,
        }
    }

    /// Credit balances
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Follow graph
    pub fn follows(&self) -> &FollowGraph {
        &self.follows
    }

    /// Activity publishing
    pub fn fanout(&self) -> &TimelineFanoutEngine {
        &self.fanout
    }

    /// Timeline reads
    pub fn reader(&self) -> &TimelineReader {
        &self.reader
    }

    /// Configuration in effect
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Stop accepting operations
    ///
    /// Every later call on any component fails with `StoreUnavailable`.
    /// A caller-provided store is left to its owner.
    pub fn shutdown(&self) {
        if let Some(memory) = &self.memory {
            memory.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oddjobz_core::UserId;
    use tempfile::TempDir;

    #[test]
    fn test_open_writes_default_config() {
        let dir = TempDir::new().unwrap();
        let market = Marketplace::open(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(market.config(), &MarketConfig::default());
    }

    #[test]
    fn test_open_reads_existing_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[store]\nlock_timeout_ms = 40\n[timeline]\nmax_len = 2\n",
        )
        .unwrap();
        let market = Marketplace::open(dir.path()).unwrap();
        assert_eq!(market.config().store.lock_timeout_ms, 40);
        assert_eq!(market.config().timeline.max_len, Some(2));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[fanout]\nbatch_size = 0\n").unwrap();
        assert!(matches!(
            Marketplace::open(dir.path()),
            Err(MarketError::Config(_))
        ));
    }

    #[test]
    fn test_shutdown_rejects_operations() {
        let market = Marketplace::ephemeral();
        let alice = UserId::new("alice").unwrap();
        market.ledger().credit(&alice, 5).unwrap();

        market.shutdown();
        let err = market.ledger().balance(&alice).unwrap_err();
        assert!(matches!(err, MarketError::StoreUnavailable(_)));
    }

    #[test]
    fn test_components_share_the_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let market = Marketplace::with_store(store.clone(), MarketConfig::default()).unwrap();
        let alice = UserId::new("alice").unwrap();
        market.ledger().credit(&alice, 9).unwrap();
        assert_eq!(CreditLedger::new(store).balance(&alice).unwrap(), 9);
    }
}
