//! Store abstraction: `KeyValueStore`, `ScriptContext` and `Script`
//!
//! The ledger and fan-out engine depend only on this capability set, never on
//! a concrete store. Any store that can run a sequence of operations as one
//! indivisible unit (server-side scripting, transactions, or the in-process
//! `MemoryStore`) can sit behind these traits.
//!
//! ## Scripts
//!
//! A [`Script`] declares the keys it touches and runs against a
//! [`ScriptContext`]. The store guarantees:
//!
//! - no other script or single-key operation observes intermediate state of
//!   the declared keys;
//! - a script returning `Err` leaves no trace (all-or-nothing);
//! - waiting for a contended key is bounded by the store's lock timeout and
//!   reported as `StoreTimeout`.
//!
//! ```text
//! struct Incr { key: String }
//!
//! impl Script for Incr {
//!     type Output = i64;
//!     fn name(&self) -> &'static str { "incr" }
//!     fn keys(&self) -> Vec<String> { vec![self.key.clone()] }
//!     fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<i64> {
//!         ctx.incr_by(&self.key, 1)
//!     }
//! }
//!
//! let n = store.run_script(&Incr { key: "hits".into() })?;
//! ```

use crate::error::{MarketError, MarketResult};
use crate::value::StoreValue;

/// Operations available to a running script
///
/// List indices follow the usual conventions: index 0 is the head, negative
/// indices count from the tail (`-1` is the last element), and `lrange` /
/// `ltrim` bounds are inclusive.
pub trait ScriptContext {
    /// Read the value under `key`
    fn get(&mut self, key: &str) -> MarketResult<Option<StoreValue>>;

    /// Overwrite the value under `key`
    fn set(&mut self, key: &str, value: StoreValue) -> MarketResult<()>;

    /// Remove `key`. Returns whether it existed.
    fn del(&mut self, key: &str) -> MarketResult<bool>;

    /// Add `delta` to the integer under `key` (missing counts as 0)
    fn incr_by(&mut self, key: &str, delta: i64) -> MarketResult<i64>;

    /// Push `value` at the head of the list. Returns the new length.
    fn lpush(&mut self, key: &str, value: String) -> MarketResult<usize>;

    /// Insert `value` so it lands at position `index` (clamped to the length)
    fn linsert_at(&mut self, key: &str, index: usize, value: String) -> MarketResult<usize>;

    /// Elements in `[start, stop]`
    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> MarketResult<Vec<String>>;

    /// Element at `index`
    fn lindex(&mut self, key: &str, index: i64) -> MarketResult<Option<String>>;

    /// List length (missing counts as 0)
    fn llen(&mut self, key: &str) -> MarketResult<usize>;

    /// Keep only `[start, stop]`. Returns the number of removed elements.
    fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> MarketResult<usize>;

    /// Add `member` to the set. Returns whether it was newly added.
    fn sadd(&mut self, key: &str, member: &str) -> MarketResult<bool>;

    /// Remove `member` from the set. Returns whether it was present.
    fn srem(&mut self, key: &str, member: &str) -> MarketResult<bool>;

    /// All members, sorted
    fn smembers(&mut self, key: &str) -> MarketResult<Vec<String>>;

    /// Membership test
    fn sismember(&mut self, key: &str, member: &str) -> MarketResult<bool>;

    /// Set cardinality (missing counts as 0)
    fn scard(&mut self, key: &str) -> MarketResult<usize>;

    /// Read an integer, treating a missing key as 0
    fn get_int(&mut self, key: &str) -> MarketResult<i64> {
        match self.get(key)? {
            None => Ok(0),
            Some(StoreValue::Int(i)) => Ok(i),
            Some(other) => Err(other.wrong_type(key, "int")),
        }
    }
}

/// An indivisible unit of store work
pub trait Script {
    /// Value produced on success
    type Output;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Keys locked before `run` starts
    ///
    /// Keys touched by `run` that are not declared here are locked on first
    /// access, still bounded by the lock timeout.
    fn keys(&self) -> Vec<String>;

    /// Script body. Returning `Err` rolls back every mutation made so far.
    fn run(&self, ctx: &mut dyn ScriptContext) -> MarketResult<Self::Output>;
}

/// Shared low-latency key-value store
///
/// Thread safety: all methods must be safe to call concurrently from multiple
/// threads. Single-key operations are provided on top of [`execute`], so each
/// one is atomic on its own.
///
/// [`execute`]: KeyValueStore::execute
pub trait KeyValueStore: Send + Sync {
    /// Run `body` atomically with `keys` locked
    ///
    /// This is the one primitive a store must provide; everything else is
    /// expressed through it. Use [`ScriptExt::run_script`] for typed scripts.
    fn execute(
        &self,
        keys: &[String],
        body: &mut dyn FnMut(&mut dyn ScriptContext) -> MarketResult<()>,
    ) -> MarketResult<()>;

    /// Read one key
    fn get(&self, key: &str) -> MarketResult<Option<StoreValue>> {
        let mut out = None;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.get(key)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Read many keys in one round trip, positions matching `keys`
    fn mget(&self, keys: &[String]) -> MarketResult<Vec<Option<StoreValue>>> {
        let mut out = Vec::with_capacity(keys.len());
        self.execute(keys, &mut |ctx| {
            out.clear();
            for key in keys {
                out.push(ctx.get(key)?);
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Overwrite one key
    fn set(&self, key: &str, value: StoreValue) -> MarketResult<()> {
        self.execute(&[key.to_string()], &mut |ctx| ctx.set(key, value.clone()))
    }

    /// Remove one key
    fn del(&self, key: &str) -> MarketResult<bool> {
        let mut out = false;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.del(key)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Atomic increment
    fn incr_by(&self, key: &str, delta: i64) -> MarketResult<i64> {
        let mut out = 0;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.incr_by(key, delta)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Push at the head of a list
    fn lpush(&self, key: &str, value: String) -> MarketResult<usize> {
        let mut out = 0;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.lpush(key, value.clone())?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Range read of a list
    fn lrange(&self, key: &str, start: i64, stop: i64) -> MarketResult<Vec<String>> {
        let mut out = Vec::new();
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.lrange(key, start, stop)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// List length
    fn llen(&self, key: &str) -> MarketResult<usize> {
        let mut out = 0;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.llen(key)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Add a set member
    fn sadd(&self, key: &str, member: &str) -> MarketResult<bool> {
        let mut out = false;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.sadd(key, member)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Remove a set member
    fn srem(&self, key: &str, member: &str) -> MarketResult<bool> {
        let mut out = false;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.srem(key, member)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// All set members, sorted
    fn smembers(&self, key: &str) -> MarketResult<Vec<String>> {
        let mut out = Vec::new();
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.smembers(key)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Set membership
    fn sismember(&self, key: &str, member: &str) -> MarketResult<bool> {
        let mut out = false;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.sismember(key, member)?;
            Ok(())
        })?;
        Ok(out)
    }

    /// Set cardinality
    fn scard(&self, key: &str) -> MarketResult<usize> {
        let mut out = 0;
        self.execute(&[key.to_string()], &mut |ctx| {
            out = ctx.scard(key)?;
            Ok(())
        })?;
        Ok(out)
    }
}

/// Typed script execution for any store, including `dyn KeyValueStore`
pub trait ScriptExt {
    /// Run `script` atomically and return its output
    fn run_script<S: Script>(&self, script: &S) -> MarketResult<S::Output>;
}

impl<T: KeyValueStore + ?Sized> ScriptExt for T {
    fn run_script<S: Script>(&self, script: &S) -> MarketResult<S::Output> {
        let keys = script.keys();
        let mut output = None;
        self.execute(&keys, &mut |ctx| {
            output = Some(script.run(ctx)?);
            Ok(())
        })?;
        output.ok_or_else(|| {
            MarketError::unavailable(format!("script '{}' produced no output", script.name()))
        })
    }
}
