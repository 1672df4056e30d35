//! Rollback journal for scripts
//!
//! Every mutation a script performs records its inverse here. When the script
//! body returns an error the journal is replayed newest-first while the key
//! locks are still held, restoring the exact pre-script state. Nothing is
//! recorded for reads, and nothing is cloned for list or set mutations: each
//! entry stores only what is needed to undo one step.
//!
//! ## Invariant
//!
//! Entries are undone in exact reverse order, so list indices recorded at
//! mutation time are still valid when the entry is undone.

use oddjobz_core::StoreValue;
use std::collections::{HashSet, VecDeque};

/// Slot content under one key; `None` means the key does not exist
pub(crate) type Slot = Option<StoreValue>;

/// Inverse of a single mutation
#[derive(Debug)]
pub(crate) enum Undo {
    /// Put back the whole previous value (scalars, deletes, full trims)
    Restore {
        key: String,
        previous: Slot,
    },
    /// Remove the element inserted at `index`
    ListRemoveAt { key: String, index: usize },
    /// Re-attach elements removed by a partial trim
    ListUntrim {
        key: String,
        head: Vec<String>,
        tail: Vec<String>,
    },
    /// Remove a member that was added
    SetRemove { key: String, member: String },
    /// Re-add a member that was removed
    SetInsert { key: String, member: String },
}

impl Undo {
    /// Key the entry applies to
    pub(crate) fn key(&self) -> &str {
        match self {
            Undo::Restore { key, .. }
            | Undo::ListRemoveAt { key, .. }
            | Undo::ListUntrim { key, .. }
            | Undo::SetRemove { key, .. }
            | Undo::SetInsert { key, .. } => key,
        }
    }

    /// Apply the inverse to the slot it was recorded against
    pub(crate) fn apply(self, slot: &mut Slot) {
        match self {
            Undo::Restore { previous, .. } => *slot = previous,
            Undo::ListRemoveAt { index, .. } => {
                if let Some(StoreValue::List(list)) = slot {
                    list.remove(index);
                }
            }
            Undo::ListUntrim { head, tail, .. } => {
                if slot.is_none() {
                    *slot = Some(StoreValue::List(VecDeque::new()));
                }
                if let Some(StoreValue::List(list)) = slot {
                    for item in head.into_iter().rev() {
                        list.push_front(item);
                    }
                    list.extend(tail);
                }
            }
            Undo::SetRemove { member, .. } => {
                if let Some(StoreValue::Set(set)) = slot {
                    set.remove(&member);
                }
            }
            Undo::SetInsert { member, .. } => {
                if slot.is_none() {
                    *slot = Some(StoreValue::Set(HashSet::new()));
                }
                if let Some(StoreValue::Set(set)) = slot {
                    set.insert(member);
                }
            }
        }
        drop_if_empty(slot);
    }
}

/// Empty lists and sets do not exist as keys
pub(crate) fn drop_if_empty(slot: &mut Slot) {
    if slot.as_ref().is_some_and(StoreValue::is_empty_collection) {
        *slot = None;
    }
}

/// Ordered record of undo entries for one script execution
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<Undo>,
}

impl Journal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, undo: Undo) {
        self.entries.push(undo);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drain entries newest-first
    pub(crate) fn drain_reverse(&mut self) -> impl Iterator<Item = Undo> + '_ {
        self.entries.drain(..).rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Slot {
        Some(StoreValue::List(
            items.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_restore_puts_back_previous() {
        let mut slot = Some(StoreValue::Int(7));
        Undo::Restore {
            key: "k".into(),
            previous: Some(StoreValue::Int(3)),
        }
        .apply(&mut slot);
        assert_eq!(slot, Some(StoreValue::Int(3)));
    }

    #[test]
    fn test_list_remove_at_drops_empty_list() {
        let mut slot = list(&["1"]);
        Undo::ListRemoveAt {
            key: "k".into(),
            index: 0,
        }
        .apply(&mut slot);
        assert_eq!(slot, None);
    }

    #[test]
    fn test_untrim_restores_order() {
        let mut slot = list(&["c", "d"]);
        Undo::ListUntrim {
            key: "k".into(),
            head: vec!["a".into(), "b".into()],
            tail: vec!["e".into()],
        }
        .apply(&mut slot);
        assert_eq!(slot, list(&["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn test_set_insert_recreates_missing_set() {
        let mut slot = None;
        Undo::SetInsert {
            key: "k".into(),
            member: "bob".into(),
        }
        .apply(&mut slot);
        match slot {
            Some(StoreValue::Set(set)) => assert!(set.contains("bob")),
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn test_journal_drains_newest_first() {
        let mut journal = Journal::new();
        journal.record(Undo::SetRemove {
            key: "first".into(),
            member: "m".into(),
        });
        journal.record(Undo::SetRemove {
            key: "second".into(),
            member: "m".into(),
        });
        let keys: Vec<String> = journal.drain_reverse().map(|u| u.key().to_string()).collect();
        assert_eq!(keys, vec!["second", "first"]);
        assert_eq!(journal.len(), 0);
    }
}
