use crate::core::{default_key_hasher, Identifier, KeyHasher, RingSpace};
use crate::ring::manager::RingManager;
use anyhow::Context;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Span;

/// A root span for tests that construct components directly.
pub fn span_fixture() -> Span {
    tracing::span!(tracing::Level::INFO, "test")
}

/// Installs a fmt subscriber writing through the test harness; safe to call
/// from every test, only the first call wins.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_space(m: u32) -> RingSpace {
    RingSpace::new(m).unwrap()
}

/// A random identifier inside the given space.
pub fn random_identifier(space: RingSpace) -> Identifier {
    space.reduce(rand::rng().random_range(0..space.size()))
}

/// A hasher that pins the listed names to fixed ring positions and sends
/// everything else through the default hasher. Used by scenario tests that
/// need a key to land at a known spot.
pub fn mapped_hasher(pairs: &[(&str, u64)]) -> KeyHasher {
    let map: HashMap<String, u64> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    let fallback = default_key_hasher();
    Arc::new(move |name: &str| map.get(name).copied().unwrap_or_else(|| fallback(name)))
}

/// Builds a ring with the given node identifiers (joined in order) and runs
/// stabilization to a fixed point.
pub fn build_ring(m: u32, ids: &[u64]) -> anyhow::Result<RingManager> {
    build_ring_with_hasher(m, ids, default_key_hasher())
}

pub fn build_ring_with_hasher(
    m: u32,
    ids: &[u64],
    hasher: KeyHasher,
) -> anyhow::Result<RingManager> {
    let manager = RingManager::new(m, hasher)?;
    for id in ids {
        manager
            .join_node(Some(Identifier::new(*id)))
            .with_context(|| format!("joining node {id}"))?;
    }
    converge(&manager);
    Ok(manager)
}

/// Ticks until a full round leaves every successor/predecessor pointer
/// unchanged (a fixed point of the protocol), capped at `2N + 5` rounds.
/// Returns the number of rounds it took.
pub fn converge(manager: &RingManager) -> usize {
    let cap = 2 * manager.len() + 5;
    let mut before = manager.dump_ring_state();
    for round in 0..cap {
        manager.tick();
        let after = manager.dump_ring_state();
        if after == before {
            return round;
        }
        before = after;
    }
    cap
}

/// Converges the ring and then runs `m` extra rounds so every finger entry
/// of every node has been recomputed at least once.
pub fn stabilize_fully(manager: &RingManager) {
    converge(manager);
    manager.run_stabilization_rounds(manager.space().bits() as usize);
}

/// The expected owner of `kid` among `ids`: the smallest identifier at or
/// after it cyclically. Oracle for ownership tests.
pub fn expected_owner(ids: &[u64], kid: u64) -> u64 {
    ids.iter()
        .copied()
        .filter(|id| *id >= kid)
        .min()
        .or_else(|| ids.iter().copied().min())
        .expect("at least one node id")
}
