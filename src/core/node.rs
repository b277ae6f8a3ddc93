use crate::core::errors::RingResult;
use crate::core::keystore::StoredEntry;
use crate::core::model::ring_space::Identifier;
use crate::core::model::status::NodeStatus;
use unimock::unimock;

/// One row of a ring dump: a node's identity and its neighbor pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStateEntry {
    pub id: Identifier,
    pub successor: Option<Identifier>,
    pub predecessor: Option<Identifier>,
}

/// Node is the call surface a ring participant exposes to its peers. In this
/// crate calls are dispatched synchronously through the registry; a real
/// deployment would carry the same contract over a network transport.
///
/// Implementations serialize access to their own state, so any of these may
/// be invoked concurrently with the node's own stabilization tick.
#[unimock(api = NodeMock)]
pub trait Node: Send + Sync {
    /// The node's position on the ring.
    fn id(&self) -> Identifier;

    /// The node's lifecycle state.
    fn status(&self) -> NodeStatus;

    /// Current successor pointer; `None` when the node is isolated.
    fn successor(&self) -> Option<Identifier>;

    /// Current predecessor pointer; may be transiently stale or unset.
    fn predecessor(&self) -> Option<Identifier>;

    /// Resolves the node owning `target` with the default hop budget of `2m`.
    fn find_successor(&self, target: Identifier) -> RingResult<Identifier>;

    /// Routing step with an explicit remaining hop budget; exhausting the
    /// budget yields `RoutingFailure` instead of looping forever.
    fn find_successor_bounded(&self, target: Identifier, budget: u32) -> RingResult<Identifier>;

    /// Like `find_successor`, additionally returning the sequence of nodes
    /// that processed the query (this node first). The owner is not part of
    /// the path, so `path.len() - 1` is the number of forwarding hops.
    fn find_successor_traced(
        &self,
        target: Identifier,
        budget: u32,
    ) -> RingResult<(Identifier, Vec<Identifier>)>;

    /// Predecessor-candidate offer: adopt `candidate` when the slot is unset
    /// or it lies strictly between the current predecessor and this node.
    fn notify(&self, candidate: Identifier) -> RingResult<()>;

    /// One stabilization step: check the successor's predecessor, adopt a
    /// closer successor if one joined in between, then notify the successor.
    fn stabilize(&self) -> RingResult<()>;

    /// Recomputes a single finger entry, round-robin across the table.
    fn fix_next_finger(&self) -> RingResult<()>;

    /// Orderly departure: hand all keys to the successor, repoint both
    /// neighbors, deregister. Neighbor failures are logged, not fatal.
    fn leave(&self) -> RingResult<()>;

    /// A departing predecessor points this node's successor past itself.
    fn adopt_successor(&self, new_successor: Identifier) -> RingResult<()>;

    /// A departing successor points this node's predecessor past itself.
    fn adopt_predecessor(&self, new_predecessor: Option<Identifier>) -> RingResult<()>;

    /// Receives key entries migrated from another node.
    fn absorb_entries(&self, entries: Vec<(Identifier, StoredEntry)>) -> RingResult<()>;

    /// Drains and returns the entries this node no longer owns now that `to`
    /// sits immediately counter-clockwise of it, i.e. everything outside
    /// `(to, self]`.
    fn release_entries(&self, to: Identifier) -> RingResult<Vec<(Identifier, StoredEntry)>>;

    /// Stores one entry in this node's key store.
    fn store(&self, id: Identifier, entry: StoredEntry) -> RingResult<()>;

    /// Reads one entry from this node's key store.
    fn fetch(&self, id: Identifier) -> RingResult<Option<StoredEntry>>;

    /// Marks the node failed; subsequent dispatches to it are rejected.
    fn mark_failed(&self);

    /// Snapshot of the finger table, index order.
    fn finger_entries(&self) -> Vec<Option<Identifier>>;

    /// The node's row for a ring dump.
    fn ring_state(&self) -> RingStateEntry;
}

impl std::fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id()).finish_non_exhaustive()
    }
}
