//! In-process key-value store with atomic scripts
//!
//! # Design
//!
//! - DashMap: sharded key space, each key maps to its own slot
//! - Per-key `parking_lot::Mutex`: scripts touching disjoint keys never contend
//! - Timed acquisition: every lock wait is bounded by `lock_timeout`
//! - Rollback journal: a failing script is undone before its locks drop
//!
//! # Script Protocol
//!
//! ```text
//! 1. check_accepting()      - refuse work after close()
//! 2. sort + dedup keys      - fixed lock order, no deadlock between scripts
//! 3. lock declared keys     - each bounded by lock_timeout
//! 4. run body               - undeclared keys locked on first access
//! 5. Ok  -> release locks   (commit)
//!    Err -> rollback journal, then release locks
//! ```
//!
//! Single-key operations from [`KeyValueStore`] run through the same path, so
//! a plain `lrange` can never observe a script half-way through.

use crate::context::LockedContext;
use crate::journal::Slot;
use crate::testing::{Access, FaultPlan};
use dashmap::DashMap;
use oddjobz_core::{KeyValueStore, MarketError, MarketResult, ScriptContext};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default bound on how long a script waits for one key lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Options for a [`MemoryStore`]
///
/// # Example
/// ```ignore
/// let options = StoreOptions::new().with_lock_timeout(Duration::from_millis(50));
/// let store = MemoryStore::with_options(options);
/// ```
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum wait for a single key lock
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl StoreOptions {
    /// Options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock wait bound
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

/// Counters describing script outcomes since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Scripts whose body returned `Ok`
    pub committed: u64,
    /// Scripts undone because the body returned `Err`
    pub rolled_back: u64,
    /// Lock acquisitions that hit the timeout
    pub lock_timeouts: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    committed: AtomicU64,
    rolled_back: AtomicU64,
    lock_timeouts: AtomicU64,
}

/// Shared in-memory store
///
/// # Thread Safety
///
/// All operations are thread-safe. Scripts serialize only against other
/// scripts that touch at least one common key.
///
/// # Example
///
/// ```ignore
/// use oddjobz_storage::MemoryStore;
/// use oddjobz_core::{KeyValueStore, ScriptExt};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// store.incr_by("activity:next_id", 1)?;
/// ```
pub struct MemoryStore {
    slots: DashMap<String, Arc<Mutex<Slot>>>,
    lock_timeout: Duration,
    accepting: AtomicBool,
    faults: RwLock<FaultPlan>,
    stats: StatCounters,
}

impl MemoryStore {
    /// Create a store with default options
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Create a store with the given options
    pub fn with_options(options: StoreOptions) -> Self {
        debug!(
            target: "oddjobz::store",
            lock_timeout_ms = options.lock_timeout.as_millis() as u64,
            "Opening memory store"
        );
        Self {
            slots: DashMap::new(),
            lock_timeout: options.lock_timeout,
            accepting: AtomicBool::new(true),
            faults: RwLock::new(FaultPlan::new()),
            stats: StatCounters::default(),
        }
    }

    /// Configured lock wait bound
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Stop accepting operations; later calls fail with `StoreUnavailable`
    ///
    /// Scripts already holding their locks run to completion.
    pub fn close(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            info!(target: "oddjobz::store", keys = self.slot_count(), "Memory store closed");
        }
    }

    /// Number of keys with a live lock slot
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Install a fault plan, replacing any previous one
    pub fn inject_faults(&self, plan: FaultPlan) {
        *self.faults.write() = plan;
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        *self.faults.write() = FaultPlan::new();
    }

    /// Snapshot of the outcome counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            committed: self.stats.committed.load(Ordering::Relaxed),
            rolled_back: self.stats.rolled_back.load(Ordering::Relaxed),
            lock_timeouts: self.stats.lock_timeouts.load(Ordering::Relaxed),
        }
    }

    fn check_accepting(&self) -> MarketResult<()> {
        if self.is_closed() {
            return Err(MarketError::unavailable("store is closed"));
        }
        Ok(())
    }

    pub(crate) fn check_fault(&self, key: &str, access: Access) -> MarketResult<()> {
        self.faults.read().check(key, access)
    }

    /// Lock the slot for `key`, creating it if needed
    pub(crate) fn lock_slot(&self, key: &str) -> MarketResult<ArcMutexGuard<RawMutex, Slot>> {
        let slot = match self.slots.get(key) {
            Some(existing) => Arc::clone(existing.value()),
            None => Arc::clone(self.slots.entry(key.to_string()).or_default().value()),
        };
        match slot.try_lock_arc_for(self.lock_timeout) {
            Some(guard) => Ok(guard),
            None => {
                self.stats.lock_timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(target: "oddjobz::store", key, "Lock wait timed out");
                Err(MarketError::StoreTimeout {
                    key: key.to_string(),
                    waited_ms: self.lock_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Drop the slot for `key` if it is empty and nobody else holds it
    ///
    /// `lock_slot` clones a slot under the map's shard lock, so a slot seen
    /// here with a single owner cannot be picked up concurrently.
    pub(crate) fn prune_slot(&self, key: &str) {
        self.slots.remove_if(key, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_some_and(|value| value.is_none())
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn execute(
        &self,
        keys: &[String],
        body: &mut dyn FnMut(&mut dyn ScriptContext) -> MarketResult<()>,
    ) -> MarketResult<()> {
        self.check_accepting()?;

        let mut ordered: Vec<&str> = keys.iter().map(String::as_str).collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut ctx = LockedContext::new(self);
        for key in ordered {
            ctx.acquire(key)?;
        }

        match body(&mut ctx) {
            Ok(()) => {
                self.stats.committed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                let undone = ctx.mutations();
                ctx.rollback();
                self.stats.rolled_back.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "oddjobz::store",
                    undone,
                    error = %e,
                    "Script rolled back"
                );
                Err(e)
            }
        }
    }
}
