use crate::core::{
    FingerTable, Identifier, KeyStore, Node, NodeStatus, RingError, RingResult, RingSpace,
    RingStateEntry, StoredEntry,
};
use crate::ring::registry::Registry;
use parking_lot::RwLock;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{Level, Span};

/// ChordNode is a ring participant: it owns its identifier, neighbor
/// pointers, finger table and key store, and reaches every other node by
/// identifier through the shared [`Registry`].
///
/// All mutable state sits behind one lock, and that lock is never held
/// across a cross-node call, so cross-node traffic may interleave
/// arbitrarily with this node's own stabilization tick, which is what the
/// protocol is designed to tolerate.
pub struct ChordNode {
    id: Identifier,
    space: RingSpace,
    registry: Arc<Registry>,
    state: RwLock<NodeState>,
    store: KeyStore,
    span: Span,
}

struct NodeState {
    status: NodeStatus,
    successor: Option<Identifier>,
    predecessor: Option<Identifier>,
    fingers: FingerTable,
    next_fix: usize,
}

/// The outcome of one local routing decision.
enum RoutingStep {
    /// The target falls in `(self, successor]`; the successor owns it.
    Owner(Identifier),
    /// Forward the query to this node, the closest known predecessor of the
    /// target.
    Forward(Identifier),
}

impl ChordNode {
    /// Creates a node in the `Joining` state. It becomes part of the ring
    /// only once registered and taken through [`ChordNode::join`].
    pub fn new(parent_span: &Span, id: Identifier, registry: Arc<Registry>) -> Arc<ChordNode> {
        let space = registry.space();
        let span = tracing::span!(parent: parent_span, Level::INFO, "chord_node", id = %id);
        Arc::new(ChordNode {
            id,
            space,
            registry,
            state: RwLock::new(NodeState {
                status: NodeStatus::Joining,
                successor: None,
                predecessor: None,
                fingers: FingerTable::new(space, id),
                next_fix: 0,
            }),
            store: KeyStore::new(),
            span,
        })
    }

    /// Joins the ring. With no contact the node forms a single-node ring
    /// (successor = predecessor = self). Otherwise the contact resolves this
    /// node's successor, the finger table is seeded through the contact, and
    /// the keys this node now owns are pulled over from the successor. The
    /// predecessor is left unset; stabilization fills it in.
    ///
    /// Fails with `UnreachablePeer` when the contact is gone; the caller
    /// retries with a different contact.
    pub fn join(&self, contact: Option<Identifier>) -> RingResult<()> {
        let _enter = self.span.enter();
        let contact_id = match contact {
            None => {
                let mut st = self.state.write();
                st.successor = Some(self.id);
                st.predecessor = Some(self.id);
                st.status = NodeStatus::Active;
                tracing::debug!("joined as the first node on the ring");
                return Ok(());
            }
            Some(contact_id) => contact_id,
        };

        let contact = self.registry.dispatch(contact_id)?;
        let succ = contact.find_successor(self.id)?;
        {
            let mut st = self.state.write();
            st.successor = Some(succ);
            st.predecessor = None;
            st.fingers.set(0, succ);
        }
        self.init_fingers(contact.as_ref());
        self.state.write().status = NodeStatus::Active;
        self.pull_keys(succ);
        tracing::debug!("joined via contact {} with successor {}", contact_id, succ);
        Ok(())
    }

    /// Seeds every finger entry by routing through the contact. A transient
    /// routing failure leaves the entry empty for fix-finger to repair.
    fn init_fingers(&self, contact: &dyn Node) {
        for i in 0..self.space.bits() as usize {
            let start = self.space.add_pow2(self.id, i as u32);
            match contact.find_successor(start) {
                Ok(owner) => self.state.write().fingers.set(i, owner),
                Err(e) => {
                    tracing::trace!("finger {} init failed ({}); left for fix_finger", i, e);
                }
            }
        }
    }

    /// Pulls the entries in `(predecessor, self]` from the successor, which
    /// held them before this node joined.
    fn pull_keys(&self, succ: Identifier) {
        if succ == self.id {
            return;
        }
        match self
            .registry
            .dispatch(succ)
            .and_then(|n| n.release_entries(self.id))
        {
            Ok(entries) if !entries.is_empty() => {
                tracing::debug!("migrated {} entries from successor {}", entries.len(), succ);
                self.store.absorb(entries);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("key migration from successor {} failed: {}", succ, e);
            }
        }
    }

    /// Hop budget for a fresh lookup: twice the identifier width, generous
    /// against transient inconsistency during concurrent joins.
    fn hop_limit(&self) -> u32 {
        2 * self.space.bits()
    }

    /// One local routing decision, taken under the state lock and returned
    /// so the cross-node forward happens with no lock held.
    fn routing_step(&self, target: Identifier) -> RingResult<RoutingStep> {
        let st = self.state.read();
        let succ = st.successor.ok_or(RingError::RingPartitioned)?;
        if self.space.in_open_closed(target, self.id, succ) {
            return Ok(RoutingStep::Owner(succ));
        }
        // The successor itself always qualifies as a non-overshooting hop
        // when no finger does.
        Ok(RoutingStep::Forward(
            st.fingers.closest_preceding(target).unwrap_or(succ),
        ))
    }

    /// Drops a dead peer from all local pointers. When the successor is
    /// lost, the lowest-index live finger takes its place. With none left,
    /// the registry's sole remaining member collapses to a single-node ring;
    /// a node with other live members it cannot reach is isolated and
    /// reports `RingPartitioned` on lookups until stabilization reconnects
    /// it.
    fn handle_unreachable(&self, dead: Identifier) {
        let _enter = self.span.enter();
        tracing::warn!("peer {} unreachable; purging local pointers", dead);
        let (lost_successor, candidates) = {
            let mut st = self.state.write();
            st.fingers.remove(dead);
            if st.predecessor == Some(dead) {
                st.predecessor = None;
            }
            let lost = st.successor == Some(dead);
            if lost {
                st.successor = None;
            }
            (lost, st.fingers.candidates())
        };
        if !lost_successor {
            return;
        }
        let mut fallback = None;
        for candidate in candidates {
            if self.registry.dispatch(candidate).is_ok() {
                fallback = Some(candidate);
                break;
            }
        }
        // With no live finger left, a node that is the registry's only
        // remaining member collapses back to a single-node ring; anything
        // else is a genuine partition.
        let last_standing =
            fallback.is_none() && self.registry.len() == 1 && self.registry.contains(self.id);
        let mut st = self.state.write();
        if st.successor.is_none() {
            match fallback {
                Some(f) => {
                    st.successor = Some(f);
                    tracing::debug!("successor repaired via finger fallback to {}", f);
                }
                None if last_standing => {
                    st.successor = Some(self.id);
                    st.predecessor = Some(self.id);
                    tracing::debug!("last node on the ring; successor reset to self");
                }
                None => tracing::warn!("no reachable successor; node is isolated"),
            }
        }
    }
}

impl Node for ChordNode {
    fn id(&self) -> Identifier {
        self.id
    }

    fn status(&self) -> NodeStatus {
        self.state.read().status
    }

    fn successor(&self) -> Option<Identifier> {
        self.state.read().successor
    }

    fn predecessor(&self) -> Option<Identifier> {
        self.state.read().predecessor
    }

    fn find_successor(&self, target: Identifier) -> RingResult<Identifier> {
        self.find_successor_bounded(target, self.hop_limit())
    }

    fn find_successor_bounded(&self, target: Identifier, budget: u32) -> RingResult<Identifier> {
        let _enter = self.span.enter();
        let mut budget = budget;
        loop {
            if budget == 0 {
                tracing::debug!("hop budget exhausted routing to {}", target);
                return Err(RingError::RoutingFailure { target });
            }
            budget -= 1;
            let next = match self.routing_step(target)? {
                RoutingStep::Owner(owner) => return Ok(owner),
                RoutingStep::Forward(next) => next,
            };
            match self.registry.dispatch(next) {
                Ok(node) => return node.find_successor_bounded(target, budget),
                Err(RingError::UnreachablePeer { .. }) => {
                    // purge the dead hop and re-decide locally
                    self.handle_unreachable(next);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn find_successor_traced(
        &self,
        target: Identifier,
        budget: u32,
    ) -> RingResult<(Identifier, Vec<Identifier>)> {
        let _enter = self.span.enter();
        let mut budget = budget;
        loop {
            if budget == 0 {
                return Err(RingError::RoutingFailure { target });
            }
            budget -= 1;
            let next = match self.routing_step(target)? {
                RoutingStep::Owner(owner) => return Ok((owner, vec![self.id])),
                RoutingStep::Forward(next) => next,
            };
            match self.registry.dispatch(next) {
                Ok(node) => {
                    let (owner, mut path) = node.find_successor_traced(target, budget)?;
                    path.insert(0, self.id);
                    return Ok((owner, path));
                }
                Err(RingError::UnreachablePeer { .. }) => {
                    self.handle_unreachable(next);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn notify(&self, candidate: Identifier) -> RingResult<()> {
        let _enter = self.span.enter();
        if candidate == self.id {
            return Ok(());
        }
        // Liveness of the current predecessor is probed before taking the
        // write lock; the lock is never held across the dispatch.
        let observed = self.state.read().predecessor;
        let observed_dead = match observed {
            Some(p) if p != self.id => self.registry.dispatch(p).is_err(),
            _ => false,
        };
        let mut st = self.state.write();
        let adopt = match st.predecessor {
            None => true,
            Some(p) if p == candidate => false,
            Some(p) => {
                self.space.in_open_open(candidate, p, self.id)
                    || (observed == Some(p) && observed_dead)
            }
        };
        if adopt {
            tracing::debug!("adopted predecessor {}", candidate);
            st.predecessor = Some(candidate);
        }
        Ok(())
    }

    fn stabilize(&self) -> RingResult<()> {
        let _enter = self.span.enter();
        if self.status() != NodeStatus::Active {
            return Ok(());
        }
        let succ = match self.state.read().successor {
            Some(succ) => succ,
            None => {
                tracing::trace!("no successor; skipping stabilization");
                return Ok(());
            }
        };
        let succ_node = match self.registry.dispatch(succ) {
            Ok(node) => node,
            Err(RingError::UnreachablePeer { .. }) => {
                self.handle_unreachable(succ);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // A node between self and the successor means someone joined in the
        // gap; adopt it, but only if it is actually reachable.
        let mut current = succ;
        if let Some(p) = succ_node.predecessor() {
            if p != self.id
                && self.space.in_open_open(p, self.id, succ)
                && self.registry.dispatch(p).is_ok()
            {
                let mut st = self.state.write();
                if st.successor == Some(succ) {
                    st.successor = Some(p);
                    st.fingers.set(0, p);
                    current = p;
                    tracing::debug!("adopted closer successor {}", p);
                }
            }
        }

        match self.registry.dispatch(current) {
            Ok(node) => {
                if let Err(e) = node.notify(self.id) {
                    tracing::debug!("notify {} failed: {}", current, e);
                }
            }
            Err(RingError::UnreachablePeer { .. }) => self.handle_unreachable(current),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn fix_next_finger(&self) -> RingResult<()> {
        let _enter = self.span.enter();
        if self.status() != NodeStatus::Active {
            return Ok(());
        }
        let i = {
            let mut st = self.state.write();
            let i = st.next_fix;
            st.next_fix = (st.next_fix + 1) % st.fingers.len();
            i
        };
        let start = self.space.add_pow2(self.id, i as u32);
        let owner = self.find_successor(start)?;
        self.state.write().fingers.set(i, owner);
        Ok(())
    }

    fn leave(&self) -> RingResult<()> {
        let _enter = self.span.enter();
        let (succ, pred) = {
            let mut st = self.state.write();
            if st.status == NodeStatus::Leaving {
                return Ok(());
            }
            st.status = NodeStatus::Leaving;
            (st.successor, st.predecessor)
        };

        if let Some(succ) = succ.filter(|s| *s != self.id) {
            // Hand the whole key store to the successor. A failed transfer is
            // logged and the leave proceeds; keys die with the node, as in
            // any fail-stop crash.
            let entries = self.store.drain_where(|_| true);
            let count = entries.len();
            if count > 0 {
                match self
                    .registry
                    .dispatch(succ)
                    .and_then(|n| n.absorb_entries(entries))
                {
                    Ok(()) => {
                        tracing::debug!("transferred {} entries to successor {}", count, succ);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "peer unreachable while transferring keys on leave: {}",
                            e
                        );
                    }
                }
            }

            // Repoint both neighbors; best-effort, stabilization is the
            // correctness net for whatever this misses.
            let pred_for_succ = pred.filter(|p| *p != self.id);
            if let Some(p) = pred_for_succ {
                if let Err(e) = self
                    .registry
                    .dispatch(p)
                    .and_then(|n| n.adopt_successor(succ))
                {
                    tracing::warn!("peer unreachable while repointing predecessor on leave: {}", e);
                }
            }
            if let Err(e) = self
                .registry
                .dispatch(succ)
                .and_then(|n| n.adopt_predecessor(pred_for_succ))
            {
                tracing::warn!("peer unreachable while repointing successor on leave: {}", e);
            }
        }

        self.registry.deregister(self.id);
        tracing::debug!("left the ring");
        Ok(())
    }

    fn adopt_successor(&self, new_successor: Identifier) -> RingResult<()> {
        let _enter = self.span.enter();
        let mut st = self.state.write();
        let old = st.successor;
        st.successor = Some(new_successor);
        st.fingers.set(0, new_successor);
        if let Some(old) = old.filter(|o| *o != new_successor && *o != self.id) {
            st.fingers.remove(old);
        }
        tracing::debug!("successor repointed to {}", new_successor);
        Ok(())
    }

    fn adopt_predecessor(&self, new_predecessor: Option<Identifier>) -> RingResult<()> {
        let _enter = self.span.enter();
        let mut st = self.state.write();
        let old = st.predecessor;
        st.predecessor = new_predecessor;
        if let Some(old) = old.filter(|o| Some(*o) != new_predecessor && *o != self.id) {
            st.fingers.remove(old);
        }
        Ok(())
    }

    fn absorb_entries(&self, entries: Vec<(Identifier, StoredEntry)>) -> RingResult<()> {
        self.store.absorb(entries);
        Ok(())
    }

    fn release_entries(&self, to: Identifier) -> RingResult<Vec<(Identifier, StoredEntry)>> {
        let released = self
            .store
            .drain_where(|d| !self.space.in_open_closed(d, to, self.id));
        Ok(released)
    }

    fn store(&self, id: Identifier, entry: StoredEntry) -> RingResult<()> {
        self.store.insert(id, entry);
        Ok(())
    }

    fn fetch(&self, id: Identifier) -> RingResult<Option<StoredEntry>> {
        Ok(self.store.get(id))
    }

    fn mark_failed(&self) {
        self.state.write().status = NodeStatus::Failed;
    }

    fn finger_entries(&self) -> Vec<Option<Identifier>> {
        self.state.read().fingers.entries()
    }

    fn ring_state(&self) -> RingStateEntry {
        let st = self.state.read();
        RingStateEntry {
            id: self.id,
            successor: st.successor,
            predecessor: st.predecessor,
        }
    }
}

impl Debug for ChordNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let st = self.state.read();
        f.debug_struct("ChordNode")
            .field("id", &self.id)
            .field("status", &st.status)
            .field("successor", &st.successor)
            .field("predecessor", &st.predecessor)
            .finish()
    }
}
