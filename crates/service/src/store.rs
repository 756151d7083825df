use std::collections::VecDeque;

use ahash::{HashSet, HashSetExt};
use codec::Name;

/// Local object names plus the bounded transit cache.
///
/// The owned set holds names published on this node and is unbounded. The
/// cache records names seen in passing `OBJECT` messages; it is a FIFO
/// bounded by the capacity given on the command line, insertion order is
/// the eviction order, and a capacity of zero disables caching entirely
/// without affecting forwarding.
pub struct ObjectStore {
    owned: HashSet<Name>,
    cache: VecDeque<Name>,
    capacity: usize,
}

impl ObjectStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            owned: HashSet::new(),
            cache: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Publish a name locally. Idempotent; returns false when the name was
    /// already owned.
    pub fn publish(&mut self, name: Name) -> bool {
        self.owned.insert(name)
    }

    /// Withdraw a locally published name. Returns false when it was not
    /// owned.
    pub fn unpublish(&mut self, name: &Name) -> bool {
        self.owned.remove(name)
    }

    pub fn has_local(&self, name: &Name) -> bool {
        self.owned.contains(name)
    }

    pub fn has_cached(&self, name: &Name) -> bool {
        self.cache.iter().any(|it| it == name)
    }

    /// Whether the name can be answered from this node at all.
    pub fn contains(&self, name: &Name) -> bool {
        self.has_local(name) || self.has_cached(name)
    }

    /// Record a name seen in a passing object message. A no-op when the
    /// name is already cached, so a duplicate insert does not disturb the
    /// eviction order.
    pub fn cache_insert(&mut self, name: Name) {
        if self.capacity == 0 || self.has_cached(&name) {
            return;
        }

        while self.cache.len() >= self.capacity {
            self.cache.pop_front();
        }

        self.cache.push_back(name);
    }

    pub fn owned(&self) -> impl Iterator<Item = &Name> {
        self.owned.iter()
    }

    /// Cached names in insertion (= eviction) order.
    pub fn cached(&self) -> impl Iterator<Item = &Name> {
        self.cache.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
