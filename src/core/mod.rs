pub mod errors;
pub mod finger;
pub mod hashing;
pub mod keystore;
pub mod model;
pub mod node;
#[cfg(test)]
pub mod testutil;

pub use crate::core::errors::{RingError, RingResult};
pub use crate::core::finger::FingerTable;
pub use crate::core::hashing::{default_key_hasher, KeyHasher};
pub use crate::core::keystore::{KeyStore, StoredEntry};
pub use crate::core::model::ring_space::{Identifier, RingSpace, MAX_RING_BITS};
pub use crate::core::model::status::NodeStatus;
pub use crate::core::node::{Node, RingStateEntry};
