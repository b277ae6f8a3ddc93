use std::fmt;
use std::fmt::{Display, Formatter};

/// NodeStatus is the lifecycle state of a ring participant.
/// Transitions: `Joining -> Active -> Leaving` (then removal), and any state
/// may be marked `Failed` when a direct call to the node errors out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// The node is locating its successor and building its finger table.
    Joining,
    /// Fully joined; serves lookups and participates in stabilization.
    Active,
    /// Handing off keys and repointing neighbors before removal.
    Leaving,
    /// Observed dead by a peer; calls to it are rejected.
    Failed,
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Joining => write!(f, "joining"),
            NodeStatus::Active => write!(f, "active"),
            NodeStatus::Leaving => write!(f, "leaving"),
            NodeStatus::Failed => write!(f, "failed"),
        }
    }
}
