use crate::core::model::ring_space::Identifier;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};

/// StoredEntry is one key/value pair held by a node. The identifier it is
/// filed under is computed from `name` by the injected hash, so the original
/// name travels with the value through migrations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub value: String,
}

impl StoredEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> StoredEntry {
        StoredEntry {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// KeyStore is the per-node map from key identifier to stored value.
/// Ownership of an entry follows the ring: it belongs to the node whose id is
/// the immediate successor of the entry's identifier, and moves between nodes
/// on join and leave. All mutation happens under a single lock so a transfer
/// is atomic with respect to concurrent reads: a racing `get` observes either
/// the pre-transfer or the post-transfer owner, never neither.
pub struct KeyStore {
    inner: Mutex<BTreeMap<Identifier, StoredEntry>>,
}

impl KeyStore {
    pub fn new() -> KeyStore {
        KeyStore {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Stores an entry, returning the previous value for that identifier.
    pub fn insert(&self, id: Identifier, entry: StoredEntry) -> Option<StoredEntry> {
        self.inner.lock().insert(id, entry)
    }

    pub fn get(&self, id: Identifier) -> Option<StoredEntry> {
        self.inner.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Atomically extracts every entry whose identifier matches `pred`. The
    /// lock is held for the full drain, which is what makes join/leave key
    /// migration atomic from a reader's point of view.
    pub fn drain_where(
        &self,
        pred: impl Fn(Identifier) -> bool,
    ) -> Vec<(Identifier, StoredEntry)> {
        let mut inner = self.inner.lock();
        let ids: Vec<Identifier> = inner.keys().copied().filter(|id| pred(*id)).collect();
        let mut drained = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = inner.remove(&id) {
                drained.push((id, entry));
            }
        }
        drained
    }

    /// Bulk-inserts entries received from another node.
    pub fn absorb(&self, entries: Vec<(Identifier, StoredEntry)>) {
        let mut inner = self.inner.lock();
        for (id, entry) in entries {
            inner.insert(id, entry);
        }
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        KeyStore::new()
    }
}

impl Debug for KeyStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_map().entries(inner.iter()).finish()
    }
}
