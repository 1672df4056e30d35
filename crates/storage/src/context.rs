//! Script execution context
//!
//! `LockedContext` is what a script body sees. It owns the lock guards of every
//! key the script has touched, applies operations directly to the locked
//! slots, and journals the inverse of each mutation so a failing script can
//! be rolled back before its locks are released.

use crate::journal::{drop_if_empty, Journal, Slot, Undo};
use crate::store::MemoryStore;
use crate::testing::Access;
use oddjobz_core::{MarketError, MarketResult, ScriptContext, StoreValue};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::RawMutex;
use rustc_hash::FxHashMap;
use std::collections::{HashSet, VecDeque};

type SlotGuard = ArcMutexGuard<RawMutex, Slot>;

/// Resolve inclusive `[start, stop]` list bounds against `len`
///
/// Negative bounds count from the tail. Returns `None` for an empty range.
pub(crate) fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn list_mut<'s>(slot: &'s mut Slot, key: &str) -> MarketResult<&'s mut VecDeque<String>> {
    match slot.get_or_insert_with(|| StoreValue::List(VecDeque::new())) {
        StoreValue::List(list) => Ok(list),
        other => Err(other.wrong_type(key, "list")),
    }
}

fn list_ref<'s>(slot: &'s Slot, key: &str) -> MarketResult<Option<&'s VecDeque<String>>> {
    match slot {
        None => Ok(None),
        Some(StoreValue::List(list)) => Ok(Some(list)),
        Some(other) => Err(other.wrong_type(key, "list")),
    }
}

fn set_ref<'s>(slot: &'s Slot, key: &str) -> MarketResult<Option<&'s HashSet<String>>> {
    match slot {
        None => Ok(None),
        Some(StoreValue::Set(set)) => Ok(Some(set)),
        Some(other) => Err(other.wrong_type(key, "set")),
    }
}

/// Context holding the locks of one script execution
pub(crate) struct LockedContext<'a> {
    store: &'a MemoryStore,
    guards: FxHashMap<String, SlotGuard>,
    journal: Journal,
}

impl<'a> LockedContext<'a> {
    pub(crate) fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            guards: FxHashMap::default(),
            journal: Journal::new(),
        }
    }

    /// Lock `key` unless this context already holds it
    pub(crate) fn acquire(&mut self, key: &str) -> MarketResult<()> {
        if self.guards.contains_key(key) {
            return Ok(());
        }
        let guard = self.store.lock_slot(key)?;
        self.guards.insert(key.to_string(), guard);
        Ok(())
    }

    fn slot(&mut self, key: &str, access: Access) -> MarketResult<&mut Slot> {
        self.store.check_fault(key, access)?;
        self.acquire(key)?;
        match self.guards.get_mut(key) {
            Some(guard) => Ok(&mut **guard),
            None => Err(MarketError::unavailable(format!(
                "lock for key '{}' vanished",
                key
            ))),
        }
    }

    /// Number of journaled mutations
    pub(crate) fn mutations(&self) -> usize {
        self.journal.len()
    }

    /// Undo every journaled mutation, newest first
    pub(crate) fn rollback(&mut self) {
        let entries: Vec<Undo> = self.journal.drain_reverse().collect();
        for undo in entries {
            if let Some(guard) = self.guards.get_mut(undo.key()) {
                undo.apply(&mut **guard);
            }
        }
    }
}

impl Drop for LockedContext<'_> {
    fn drop(&mut self) {
        // Unlock everything first, then forget slots left empty
        let empty: Vec<String> = self
            .guards
            .drain()
            .filter_map(|(key, guard)| guard.is_none().then_some(key))
            .collect();
        for key in empty {
            self.store.prune_slot(&key);
        }
    }
}

impl ScriptContext for LockedContext<'_> {
    fn get(&mut self, key: &str) -> MarketResult<Option<StoreValue>> {
        Ok(self.slot(key, Access::Read)?.clone())
    }

    fn set(&mut self, key: &str, value: StoreValue) -> MarketResult<()> {
        let slot = self.slot(key, Access::Write)?;
        let previous = std::mem::replace(slot, Some(value));
        drop_if_empty(slot);
        self.journal.record(Undo::Restore {
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    fn del(&mut self, key: &str) -> MarketResult<bool> {
        let previous = self.slot(key, Access::Write)?.take();
        let existed = previous.is_some();
        if existed {
            self.journal.record(Undo::Restore {
                key: key.to_string(),
                previous,
            });
        }
        Ok(existed)
    }

    fn incr_by(&mut self, key: &str, delta: i64) -> MarketResult<i64> {
        let slot = self.slot(key, Access::Write)?;
        let current = match slot {
            None => 0,
            Some(StoreValue::Int(i)) => *i,
            Some(other) => return Err(other.wrong_type(key, "int")),
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            MarketError::invalid_input(format!("increment of '{}' by {} overflows", key, delta))
        })?;
        let previous = slot.replace(StoreValue::Int(next));
        self.journal.record(Undo::Restore {
            key: key.to_string(),
            previous,
        });
        Ok(next)
    }

    fn lpush(&mut self, key: &str, value: String) -> MarketResult<usize> {
        self.linsert_at(key, 0, value)
    }

    fn linsert_at(&mut self, key: &str, index: usize, value: String) -> MarketResult<usize> {
        let list = list_mut(self.slot(key, Access::Write)?, key)?;
        let index = index.min(list.len());
        list.insert(index, value);
        let len = list.len();
        self.journal.record(Undo::ListRemoveAt {
            key: key.to_string(),
            index,
        });
        Ok(len)
    }

    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> MarketResult<Vec<String>> {
        let slot = self.slot(key, Access::Read)?;
        let Some(list) = list_ref(slot, key)? else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((s, e)) => list.range(s..=e).cloned().collect(),
            None => Vec::new(),
        })
    }

    fn lindex(&mut self, key: &str, index: i64) -> MarketResult<Option<String>> {
        let slot = self.slot(key, Access::Read)?;
        let Some(list) = list_ref(slot, key)? else {
            return Ok(None);
        };
        Ok(resolve_index(list.len(), index).and_then(|i| list.get(i).cloned()))
    }

    fn llen(&mut self, key: &str) -> MarketResult<usize> {
        let slot = self.slot(key, Access::Read)?;
        Ok(list_ref(slot, key)?.map_or(0, VecDeque::len))
    }

    fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> MarketResult<usize> {
        let slot = self.slot(key, Access::Write)?;
        let len = match list_ref(slot, key)? {
            Some(list) => list.len(),
            None => return Ok(0),
        };
        match resolve_range(len, start, stop) {
            None => {
                let previous = slot.take();
                self.journal.record(Undo::Restore {
                    key: key.to_string(),
                    previous,
                });
                Ok(len)
            }
            Some((s, e)) if s == 0 && e + 1 == len => Ok(0),
            Some((s, e)) => {
                let list = list_mut(slot, key)?;
                let tail: Vec<String> = list.drain(e + 1..).collect();
                let head: Vec<String> = list.drain(..s).collect();
                let removed = head.len() + tail.len();
                self.journal.record(Undo::ListUntrim {
                    key: key.to_string(),
                    head,
                    tail,
                });
                Ok(removed)
            }
        }
    }

    fn sadd(&mut self, key: &str, member: &str) -> MarketResult<bool> {
        let slot = self.slot(key, Access::Write)?;
        let added = match slot.get_or_insert_with(|| StoreValue::Set(HashSet::new())) {
            StoreValue::Set(set) => set.insert(member.to_string()),
            other => return Err(other.wrong_type(key, "set")),
        };
        drop_if_empty(slot);
        if added {
            self.journal.record(Undo::SetRemove {
                key: key.to_string(),
                member: member.to_string(),
            });
        }
        Ok(added)
    }

    fn srem(&mut self, key: &str, member: &str) -> MarketResult<bool> {
        let slot = self.slot(key, Access::Write)?;
        let removed = match slot {
            None => false,
            Some(StoreValue::Set(set)) => set.remove(member),
            Some(other) => return Err(other.wrong_type(key, "set")),
        };
        drop_if_empty(slot);
        if removed {
            self.journal.record(Undo::SetInsert {
                key: key.to_string(),
                member: member.to_string(),
            });
        }
        Ok(removed)
    }

    fn smembers(&mut self, key: &str) -> MarketResult<Vec<String>> {
        let slot = self.slot(key, Access::Read)?;
        let mut members: Vec<String> = set_ref(slot, key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    fn sismember(&mut self, key: &str, member: &str) -> MarketResult<bool> {
        let slot = self.slot(key, Access::Read)?;
        Ok(set_ref(slot, key)?.is_some_and(|set| set.contains(member)))
    }

    fn scard(&mut self, key: &str) -> MarketResult<usize> {
        let slot = self.slot(key, Access::Read)?;
        Ok(set_ref(slot, key)?.map_or(0, HashSet::len))
    }
}
