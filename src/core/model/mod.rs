pub mod ring_space;
pub mod status;
