use crate::core::model::ring_space::{Identifier, RingSpace};
use std::fmt;
use std::fmt::{Debug, Formatter};

/// FingerTable is the per-node routing table: `m` entries, entry `i` holding
/// the best known successor of `(owner + 2^i) mod 2^m`. Entries need not be
/// distinct; higher-index entries dominate lookup reach. An entry that would
/// point at the owner itself is kept empty; routing falls back to the owner
/// naturally when no finger qualifies.
pub struct FingerTable {
    space: RingSpace,
    owner: Identifier,
    entries: Vec<Option<Identifier>>,
}

impl FingerTable {
    pub fn new(space: RingSpace, owner: Identifier) -> FingerTable {
        FingerTable {
            space,
            owner,
            entries: vec![None; space.bits() as usize],
        }
    }

    /// Number of entries, i.e. the ring's bit width `m`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ring position entry `i` is responsible for: `(owner + 2^i) mod 2^m`.
    pub fn start(&self, i: usize) -> Identifier {
        self.space.add_pow2(self.owner, i as u32)
    }

    pub fn get(&self, i: usize) -> Option<Identifier> {
        self.entries.get(i).copied().flatten()
    }

    /// Records `id` as the successor of `start(i)`. Entries pointing at the
    /// owner are dropped rather than stored.
    pub fn set(&mut self, i: usize, id: Identifier) {
        if i >= self.entries.len() {
            tracing::error!("finger index {} out of range for m = {}", i, self.len());
            return;
        }
        if id == self.owner {
            self.entries[i] = None;
            return;
        }
        self.entries[i] = Some(id);
    }

    /// Purges a dead or departed node from every entry it occupies. The holes
    /// are repaired by subsequent fix-finger rounds.
    pub fn remove(&mut self, id: Identifier) {
        for entry in self.entries.iter_mut() {
            if *entry == Some(id) {
                *entry = None;
            }
        }
    }

    /// The core routing decision: scanning from the highest entry down,
    /// returns the first finger strictly between the owner and `target`
    /// cyclically. This greedily picks the farthest known node that does not
    /// overshoot the target. `None` means no finger qualifies and the caller
    /// should treat the owner itself as the closest preceding node.
    pub fn closest_preceding(&self, target: Identifier) -> Option<Identifier> {
        self.entries
            .iter()
            .rev()
            .flatten()
            .find(|&&f| self.space.in_open_open(f, self.owner, target))
            .copied()
    }

    /// Distinct finger targets in index order, used as fallback successor
    /// candidates when the current successor is unreachable.
    pub fn candidates(&self) -> Vec<Identifier> {
        let mut seen = Vec::new();
        for entry in self.entries.iter().flatten() {
            if !seen.contains(entry) {
                seen.push(*entry);
            }
        }
        seen
    }

    /// Snapshot of all entries, index order. Entry `i` is the best known
    /// successor of `start(i)`, or `None` where nothing is recorded yet.
    pub fn entries(&self) -> Vec<Option<Identifier>> {
        self.entries.clone()
    }
}

impl Debug for FingerTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "FingerTable(owner: {}) {{", self.owner)?;
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f, "  [{}] start {} -> {:?}", i, self.start(i), entry)?;
        }
        write!(f, "}}")
    }
}
