pub mod manager;
pub mod node;
pub mod registry;
pub mod stabilizer;

#[cfg(test)]
mod failure_test;

pub use crate::ring::manager::RingManager;
pub use crate::ring::node::ChordNode;
pub use crate::ring::registry::Registry;
pub use crate::ring::stabilizer::Stabilizer;
