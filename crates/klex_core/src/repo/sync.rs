//! Replace-all child relation planning.
//!
//! A child update deletes every persisted child row of the parent, then
//! inserts the full desired set. The plan is computed here without a store
//! so the cascade can be checked in isolation.

use std::collections::HashSet;
use std::hash::Hash;

/// Rows to remove and rows to insert for one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSync<K> {
    /// Every currently persisted child key.
    pub to_delete: Vec<K>,
    /// Desired child keys in caller order, duplicates collapsed.
    pub to_insert: Vec<K>,
}

impl<K> ChildSync<K> {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty()
    }
}

/// Plans a wholesale replacement of `current` by `desired`.
///
/// No diffing: a key present on both sides is deleted and re-inserted.
pub fn plan_child_sync<K>(current: &[K], desired: &[K]) -> ChildSync<K>
where
    K: Clone + Eq + Hash,
{
    let mut seen = HashSet::with_capacity(desired.len());
    let to_insert = desired
        .iter()
        .filter(|key| seen.insert(*key))
        .cloned()
        .collect();
    ChildSync {
        to_delete: current.to_vec(),
        to_insert,
    }
}
