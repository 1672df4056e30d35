//! Fault injection for store tests
//!
//! A `FaultPlan` makes the store refuse operations on selected keys with
//! `StoreUnavailable`, as a remote store would during a partial outage. The
//! check runs before the operation touches the slot, so a refused write never
//! leaves a partial mutation behind.
//!
//! # Example
//!
//! ```ignore
//! use oddjobz_storage::testing::FaultPlan;
//!
//! store.inject_faults(FaultPlan::new().fail_writes_to("users:carol:timeline"));
//! // publish now reports carol as a failed follower push
//! store.clear_faults();
//! ```

use oddjobz_core::{MarketError, MarketResult};

/// Direction of a store access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read-only access
    Read,
    /// Mutating access
    Write,
}

/// Set of key prefixes the store should refuse
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    failing_writes: Vec<String>,
    failing_reads: Vec<String>,
}

impl FaultPlan {
    /// Empty plan: every access succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes to keys starting with `prefix`
    pub fn fail_writes_to(mut self, prefix: impl Into<String>) -> Self {
        self.failing_writes.push(prefix.into());
        self
    }

    /// Refuse reads of keys starting with `prefix`
    pub fn fail_reads_from(mut self, prefix: impl Into<String>) -> Self {
        self.failing_reads.push(prefix.into());
        self
    }

    /// Whether the plan refuses nothing
    pub fn is_empty(&self) -> bool {
        self.failing_writes.is_empty() && self.failing_reads.is_empty()
    }

    /// Check one access against the plan
    pub fn check(&self, key: &str, access: Access) -> MarketResult<()> {
        let prefixes = match access {
            Access::Read => &self.failing_reads,
            Access::Write => &self.failing_writes,
        };
        if prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(MarketError::unavailable(format!(
                "injected {:?} fault on key '{}'",
                access, key
            )));
        }
        Ok(())
    }
}
