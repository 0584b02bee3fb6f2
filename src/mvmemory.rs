//! Multi-version memory for speculative transaction writes.
//!
//! This is the core data structure that enables parallel execution with
//! optimistic concurrency control. For each location it keeps one entry per
//! writing transaction, ordered by transaction index, so a reader can resolve
//! "the latest write by a strictly lower-indexed transaction" without any
//! global lock. Concurrency is managed by DashMap: a method accessing the
//! per-key version history holds exclusive access to that key only.

use crate::types::{Incarnation, TxnIndex, Version};
use dashmap::DashMap;
use std::{collections::BTreeMap, hash::Hash, sync::Arc};

/// One write to one location by one transaction incarnation.
#[derive(Debug)]
struct Entry<V> {
    incarnation: Incarnation,
    /// `None` is a deletion marker, not an absent entry.
    value: Option<Arc<V>>,
    /// Set when the writing incarnation was aborted; the stale value is kept
    /// so readers block on the precise writer instead of proceeding with
    /// in-flight data.
    estimate: bool,
}

impl<V> Entry<V> {
    fn new(incarnation: Incarnation, value: Option<Arc<V>>) -> Self {
        Self {
            incarnation,
            value,
            estimate: false,
        }
    }
}

/// Result of reading a location on behalf of transaction `reader`.
#[derive(Debug)]
pub enum ReadResult<V> {
    /// Latest write by a lower-indexed transaction.
    Versioned(Version, Option<Arc<V>>),
    /// No write by any lower-indexed transaction; resolve from base state.
    Storage,
    /// The latest lower-indexed write is an estimate: its writer is
    /// re-executing and the reader must wait for it.
    Dependency(TxnIndex),
}

/// Multi-version map: location -> (writer index -> entry), with at most one
/// entry per (location, writer) pair. Shared by reference across all worker
/// threads for the duration of one block.
pub struct MVMemory<K, V> {
    data: DashMap<K, BTreeMap<TxnIndex, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V> MVMemory<K, V> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Resolves `key` as of transaction `reader`: the entry with the greatest
    /// writer index strictly below `reader`, the base state if there is none,
    /// or a dependency if that entry is currently an estimate.
    pub fn read(&self, key: &K, reader: TxnIndex) -> ReadResult<V> {
        if let Some(versions) = self.data.get(key) {
            if let Some((&writer, entry)) = versions.range(..reader).next_back() {
                if entry.estimate {
                    return ReadResult::Dependency(writer);
                }
                return ReadResult::Versioned(
                    Version::new(writer, entry.incarnation),
                    entry.value.clone(),
                );
            }
        }
        ReadResult::Storage
    }

    /// Inserts or replaces the entry for `(key, writer)`. A fresh write is
    /// never an estimate, so this also clears the flag on re-execution.
    pub fn write(&self, key: K, writer: TxnIndex, incarnation: Incarnation, value: Option<V>) {
        let mut versions = self.data.entry(key).or_default();
        versions.insert(writer, Entry::new(incarnation, value.map(Arc::new)));
    }

    /// Flags `writer`'s entry at `key` as an estimate without deleting the
    /// value. The aborted incarnation will very likely write the same
    /// locations again, and keeping the suspect value lets readers block on
    /// the exact dependency.
    pub fn mark_estimate(&self, key: &K, writer: TxnIndex) {
        if let Some(mut versions) = self.data.get_mut(key) {
            if let Some(entry) = versions.get_mut(&writer) {
                entry.estimate = true;
            }
        }
    }

    /// Retracts `writer`'s entry at `key`, used when a new incarnation no
    /// longer writes a location its predecessor wrote.
    pub fn remove(&self, key: &K, writer: TxnIndex) {
        if let Some(mut versions) = self.data.get_mut(key) {
            versions.remove(&writer);
        }
    }

    /// Final value per location: the entry of the highest-indexed writer.
    /// Only meaningful once the whole block has committed, at which point no
    /// estimates remain.
    pub fn final_writes(&self) -> Vec<(K, Option<V>)>
    where
        V: Clone,
    {
        self.data
            .iter()
            .filter_map(|kv| {
                kv.value().iter().next_back().map(|(_, entry)| {
                    debug_assert!(!entry.estimate, "estimate survived past block commit");
                    (kv.key().clone(), entry.value.as_deref().cloned())
                })
            })
            .collect()
    }
}

impl<K: Eq + Hash + Clone, V> Default for MVMemory<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
