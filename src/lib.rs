//! A Chord distributed hash table over a simulated in-process network.
//!
//! Nodes live on a circular identifier space of size `2^m` and route key
//! lookups through per-node finger tables in O(log N) hops. Membership is
//! dynamic: nodes join through any existing contact, leave after handing
//! their keys to their successor, and a periodic stabilization protocol
//! repairs successor/predecessor/finger pointers after every change.
//!
//! The [`ring::RingManager`] owns the registry of live nodes and stands in
//! for the network transport: cross-node calls are synchronous dispatches
//! through the registry, so the same protocol could later be carried over a
//! real RPC layer without touching the routing logic.

pub mod core;
pub mod ring;
