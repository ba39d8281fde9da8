//! Read/write access sets

use crate::resource::ResourceKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What counts as a conflict between two transactions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Any shared key conflicts, reads included
    #[default]
    AnyAccess,
    /// A shared key conflicts only if at least one side writes it
    WritesOnly,
}

/// State keys a transaction may read or write.
///
/// Ordered sets keep iteration reproducible across nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet {
    /// Keys read
    pub reads: BTreeSet<ResourceKey>,
    /// Keys written
    pub writes: BTreeSet<ResourceKey>,
}

impl AccessSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read
    pub fn record_read(&mut self, key: ResourceKey) {
        self.reads.insert(key);
    }

    /// Record a write
    pub fn record_write(&mut self, key: ResourceKey) {
        self.writes.insert(key);
    }

    /// Builder form of [`AccessSet::record_read`]
    pub fn read(mut self, key: ResourceKey) -> Self {
        self.record_read(key);
        self
    }

    /// Builder form of [`AccessSet::record_write`]
    pub fn write(mut self, key: ResourceKey) -> Self {
        self.record_write(key);
        self
    }

    /// Every key touched, each once, in key order
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.reads.union(&self.writes)
    }

    /// True if `key` is written
    pub fn writes_key(&self, key: &ResourceKey) -> bool {
        self.writes.contains(key)
    }

    /// Fold another set into this one
    pub fn merge(&mut self, other: &AccessSet) {
        self.reads.extend(other.reads.iter().copied());
        self.writes.extend(other.writes.iter().copied());
    }

    /// True if nothing is touched
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Pairwise conflict check under `policy`
    pub fn conflicts_with(&self, other: &AccessSet, policy: ConflictPolicy) -> bool {
        match policy {
            ConflictPolicy::AnyAccess => self
                .keys()
                .any(|k| other.reads.contains(k) || other.writes.contains(k)),
            ConflictPolicy::WritesOnly => {
                self.writes.iter().any(|k| other.reads.contains(k) || other.writes.contains(k))
                    || self.reads.iter().any(|k| other.writes.contains(k))
            }
        }
    }
}
