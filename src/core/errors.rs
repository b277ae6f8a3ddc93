use crate::core::model::ring_space::Identifier;
use thiserror::Error;

/// The error kinds surfaced by ring operations. Every failure is scoped to a
/// single node or a single call; none is fatal to the ring as a whole, and
/// the manager passes them to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// The target node is not registered, or has been marked failed.
    /// Recoverable: the caller retries with a different contact.
    #[error("peer {id} is unreachable")]
    UnreachablePeer { id: Identifier },

    /// The hop-count guard tripped during routing. Indicates a transient
    /// inconsistency; retry after a stabilization round.
    #[error("hop bound exceeded while routing to {target}")]
    RoutingFailure { target: Identifier },

    /// The node has no reachable successor. Surfaced to the caller rather
    /// than auto-recovered.
    #[error("ring is partitioned: no reachable successor")]
    RingPartitioned,

    /// The key is absent from its owner's store. Normal, not logged as an
    /// error.
    #[error("key {key:?} not found")]
    NotFound { key: String },

    /// A node with this identifier is already on the ring.
    #[error("node {id} already exists on the ring")]
    DuplicateNode { id: Identifier },

    /// The requested identifier width is outside `[1, 63]`.
    #[error("invalid ring size: m = {m} (must be in 1..=63)")]
    InvalidRingSize { m: u32 },

    /// Every identifier in the space is already taken.
    #[error("no free identifier left on the ring")]
    RingFull,
}

pub type RingResult<T> = Result<T, RingError>;
