//! Profile store: call counts and shadow prices keyed by callee name
//!
//! Entries are keyed by name rather than by function identity, so a profile
//! gathered from one compilation context can be applied to another context
//! built from the same source.

use indexmap::IndexMap;
use tracing::trace;

/// Capacity of the fixed-size table the bounded mode reproduces
pub const DEFAULT_BOUNDED_CAPACITY: usize = 256;

/// Observed calls and derived price for one callee
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    /// Callee name
    pub name: String,
    /// Number of observations
    pub call_count: u64,
    /// Normalized hotness in [0, 1]; 0 until the store is normalized
    pub shadow_price: f64,
}

/// Name-keyed profile with insertion-ordered iteration
///
/// Unbounded by default. A bounded store silently drops names first seen
/// after it is full; lookups of such names return the cold default.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    entries: IndexMap<String, ProfileEntry>,
    capacity: Option<usize>,
    dropped: u64,
}

impl ProfileStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `capacity` distinct names
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Name limit, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Record one observation of `name`
    pub fn record(&mut self, name: &str) {
        self.record_n(name, 1);
    }

    /// Record `n` observations of `name` at once
    pub fn record_n(&mut self, name: &str, n: u64) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.call_count = entry.call_count.saturating_add(n);
            return;
        }

        if self.capacity.is_some_and(|cap| self.entries.len() >= cap) {
            trace!(name, "profile store full, observation dropped");
            self.dropped = self.dropped.saturating_add(n);
            return;
        }

        self.entries.insert(
            name.to_string(),
            ProfileEntry {
                name: name.to_string(),
                call_count: n,
                shadow_price: 0.0,
            },
        );
    }

    /// Recompute every price as its count over the largest count
    pub fn normalize(&mut self) {
        let max = self.max_count();
        for entry in self.entries.values_mut() {
            entry.shadow_price = if max == 0 {
                0.0
            } else {
                entry.call_count as f64 / max as f64
            };
        }
    }

    /// Price of `name`, or 0.0 if it was never observed
    pub fn lookup(&self, name: &str) -> f64 {
        self.entries.get(name).map_or(0.0, |e| e.shadow_price)
    }

    /// Entry for `name`
    pub fn entry(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.get(name)
    }

    /// Entries in first-observation order
    pub fn iter(&self) -> impl Iterator<Item = &ProfileEntry> {
        self.entries.values()
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest call count, 0 when empty
    pub fn max_count(&self) -> u64 {
        self.entries.values().map(|e| e.call_count).max().unwrap_or(0)
    }

    /// Observations lost because the store was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
