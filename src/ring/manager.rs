use crate::core::{
    Identifier, KeyHasher, Node, NodeStatus, RingError, RingResult, RingSpace, RingStateEntry,
    StoredEntry,
};
use crate::ring::node::ChordNode;
use crate::ring::registry::Registry;
use rand::Rng;
use std::sync::Arc;
use tracing::{Level, Span};

/// RingManager owns one simulated ring: the registry of live nodes, the
/// injected key hasher, and the entry points the calling layer (CLI or test
/// harness) drives. It also drives stabilization: [`RingManager::tick`] runs
/// one stabilize + fix-finger round over all active nodes in ascending id
/// order.
///
/// Per-node failures during a tick are logged and swallowed; no single
/// node's trouble is allowed to stop ring maintenance.
pub struct RingManager {
    space: RingSpace,
    registry: Arc<Registry>,
    hasher: KeyHasher,
    span: Span,
}

impl RingManager {
    /// Creates an empty ring over a `2^m` identifier space.
    pub fn new(m: u32, hasher: KeyHasher) -> RingResult<RingManager> {
        let space = RingSpace::new(m)?;
        let span = tracing::span!(Level::INFO, "ring_manager", m = m);
        Ok(RingManager {
            space,
            registry: Registry::new(space),
            hasher,
            span,
        })
    }

    /// Creates an empty ring with the crate's default key hasher.
    pub fn with_default_hasher(m: u32) -> RingResult<RingManager> {
        RingManager::new(m, crate::core::default_key_hasher())
    }

    pub fn space(&self) -> RingSpace {
        self.space
    }

    /// Maps a key name onto the ring through the injected hasher.
    pub fn key_id(&self, key: &str) -> Identifier {
        self.space.reduce((self.hasher)(key))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Test and inspection accessor for a live node.
    pub fn node(&self, id: Identifier) -> Option<Arc<dyn Node>> {
        self.registry.dispatch(id).ok()
    }

    /// Adds a node to the ring, assigning a random free identifier when the
    /// caller supplies none. The first node forms the ring alone; later ones
    /// join through the lowest live identifier as contact. On a failed join
    /// the registration is rolled back.
    pub fn join_node(&self, id: Option<Identifier>) -> RingResult<Identifier> {
        let _enter = self.span.enter();
        let id = match id {
            Some(id) => self.space.reduce(id.value()),
            None => self.free_identifier()?,
        };
        let contact = self.registry.ids().into_iter().next();

        let node = ChordNode::new(&self.span, id, self.registry.clone());
        self.registry.register(node.clone())?;
        match node.join(contact) {
            Ok(()) => {
                tracing::debug!("node {} joined the ring", id);
                Ok(id)
            }
            Err(e) => {
                self.registry.deregister(id);
                Err(e)
            }
        }
    }

    /// Picks an unused identifier uniformly at random, falling back to a
    /// linear scan when the space is nearly full.
    fn free_identifier(&self) -> RingResult<Identifier> {
        let mut rng = rand::rng();
        for _ in 0..64 {
            let candidate = self.space.reduce(rng.random_range(0..self.space.size()));
            if !self.registry.contains(candidate) {
                return Ok(candidate);
            }
        }
        (0..self.space.size())
            .map(Identifier::new)
            .find(|id| !self.registry.contains(*id))
            .ok_or(RingError::RingFull)
    }

    /// Orderly departure of a node: keys move to its successor, neighbors
    /// are repointed, and the node leaves the registry.
    pub fn leave_node(&self, id: Identifier) -> RingResult<()> {
        let _enter = self.span.enter();
        let node = self.registry.dispatch(id)?;
        node.leave()
    }

    /// Simulates a crash: the node vanishes without notifying anyone.
    /// Neighbors discover the failure on their next direct call and repair
    /// through their finger tables.
    pub fn fail_node(&self, id: Identifier) -> RingResult<()> {
        let _enter = self.span.enter();
        let node = self.registry.dispatch(id)?;
        node.mark_failed();
        self.registry.deregister(id);
        tracing::debug!("node {} marked failed and removed", id);
        Ok(())
    }

    /// The entry node for lookups: any live node works; the lowest id keeps
    /// tests deterministic.
    fn entry_node(&self) -> RingResult<Arc<dyn Node>> {
        let entry = self
            .registry
            .ids()
            .into_iter()
            .next()
            .ok_or(RingError::RingPartitioned)?;
        self.registry.dispatch(entry)
    }

    /// Resolves the node owning `key`.
    pub fn lookup(&self, key: &str) -> RingResult<Identifier> {
        let _enter = self.span.enter();
        self.entry_node()?.find_successor(self.key_id(key))
    }

    /// Like [`RingManager::lookup`], also returning the routing path taken.
    pub fn lookup_traced(&self, key: &str) -> RingResult<(Identifier, Vec<Identifier>)> {
        let _enter = self.span.enter();
        let budget = 2 * self.space.bits();
        self.entry_node()?
            .find_successor_traced(self.key_id(key), budget)
    }

    /// Stores `value` under `key` on the owning node.
    pub fn put(&self, key: &str, value: &str) -> RingResult<Identifier> {
        let _enter = self.span.enter();
        let kid = self.key_id(key);
        let owner = self.entry_node()?.find_successor(kid)?;
        self.registry
            .dispatch(owner)?
            .store(kid, StoredEntry::new(key, value))?;
        tracing::debug!("stored key {:?} (id {}) on node {}", key, kid, owner);
        Ok(owner)
    }

    /// Reads the value under `key` from the owning node, or `NotFound`.
    pub fn get(&self, key: &str) -> RingResult<String> {
        let _enter = self.span.enter();
        let kid = self.key_id(key);
        let owner = self.entry_node()?.find_successor(kid)?;
        let entry = self.registry.dispatch(owner)?.fetch(kid)?;
        entry
            .map(|e| e.value)
            .ok_or_else(|| RingError::NotFound {
                key: key.to_string(),
            })
    }

    /// One stabilization round over all active nodes in ascending id order:
    /// stabilize, then repair one finger entry each.
    pub fn tick(&self) {
        let _enter = self.span.enter();
        for id in self.registry.ids() {
            let node = match self.registry.dispatch(id) {
                Ok(node) => node,
                Err(_) => continue, // left or failed mid-round
            };
            if node.status() != NodeStatus::Active {
                continue;
            }
            if let Err(e) = node.stabilize() {
                tracing::debug!("stabilize on {} failed: {}", id, e);
            }
            if let Err(e) = node.fix_next_finger() {
                tracing::debug!("fix_finger on {} failed: {}", id, e);
            }
        }
    }

    /// Runs `n` stabilization rounds back to back.
    pub fn run_stabilization_rounds(&self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Snapshot of every node's neighbor pointers, ascending id order.
    pub fn dump_ring_state(&self) -> Vec<RingStateEntry> {
        self.registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.dispatch(id).ok())
            .map(|node| node.ring_state())
            .collect()
    }
}
