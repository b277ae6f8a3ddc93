use crate::core::{Identifier, Node, NodeStatus, RingError, RingResult, RingSpace};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry is the process-wide table of live nodes for one simulated ring.
/// It stands in for the network: a cross-node call looks its target up by
/// identifier and dispatches synchronously, so holding a node `Arc` directly
/// is never required (successor/predecessor pointers are plain identifiers).
/// Entries are created on join and removed on leave or failure.
pub struct Registry {
    space: RingSpace,
    nodes: RwLock<HashMap<Identifier, Arc<dyn Node>>>,
}

impl Registry {
    pub fn new(space: RingSpace) -> Arc<Registry> {
        Arc::new(Registry {
            space,
            nodes: RwLock::new(HashMap::new()),
        })
    }

    pub fn space(&self) -> RingSpace {
        self.space
    }

    /// Registers a node under its identifier. Fails with `DuplicateNode` when
    /// the identifier is already taken.
    pub fn register(&self, node: Arc<dyn Node>) -> RingResult<()> {
        let id = node.id();
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(RingError::DuplicateNode { id });
        }
        nodes.insert(id, node);
        tracing::trace!("registered node {}", id);
        Ok(())
    }

    /// Removes a node from the registry. Missing entries are tolerated so a
    /// leaving node and its manager can both attempt cleanup.
    pub fn deregister(&self, id: Identifier) {
        if self.nodes.write().remove(&id).is_some() {
            tracing::trace!("deregistered node {}", id);
        }
    }

    pub fn contains(&self, id: Identifier) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Resolves a target for a cross-node call. A missing or failed node
    /// yields `UnreachablePeer`, the simulated equivalent of an RPC timeout.
    pub fn dispatch(&self, id: Identifier) -> RingResult<Arc<dyn Node>> {
        let node = self
            .nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or(RingError::UnreachablePeer { id })?;
        if node.status() == NodeStatus::Failed {
            return Err(RingError::UnreachablePeer { id });
        }
        Ok(node)
    }

    /// All registered identifiers in ascending order. The stable order is
    /// what makes stabilization rounds and ring dumps deterministic.
    pub fn ids(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = self.nodes.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
