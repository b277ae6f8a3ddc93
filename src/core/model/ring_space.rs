use crate::core::errors::{RingError, RingResult};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Identifier represents a position on the ring, for both nodes and keys.
/// It is only meaningful relative to a [`RingSpace`] that bounds its value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(u64);

impl Identifier {
    pub fn new(value: u64) -> Identifier {
        Identifier(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Override Debug to also call Display
impl Debug for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // This ensures both {:?} and {:#?} produce the same output as Display.
        write!(f, "{}", self)
    }
}

/// RingSpace is the circular identifier space of size `2^m`. It defines the
/// cyclic arithmetic every other component relies on: distance, interval
/// membership, and power-of-two offsets. Pure and stateless; every comparison
/// across the crate goes through it so the cyclic semantics stay consistent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RingSpace {
    m: u32,
}

/// The largest supported identifier width in bits, bounded by the u64 carrier.
pub const MAX_RING_BITS: u32 = 63;

impl RingSpace {
    /// Creates a space of size `2^m`. `m` must be in `[1, MAX_RING_BITS]`.
    pub fn new(m: u32) -> RingResult<RingSpace> {
        if m == 0 || m > MAX_RING_BITS {
            return Err(RingError::InvalidRingSize { m });
        }
        Ok(RingSpace { m })
    }

    /// The identifier width in bits, i.e. the number of finger-table entries.
    pub fn bits(&self) -> u32 {
        self.m
    }

    /// The number of positions on the ring, `2^m`.
    pub fn size(&self) -> u64 {
        1u64 << self.m
    }

    fn mask(&self) -> u64 {
        self.size() - 1
    }

    /// Maps an arbitrary u64 (e.g. a hash output) onto the ring.
    pub fn reduce(&self, raw: u64) -> Identifier {
        Identifier(raw & self.mask())
    }

    pub fn contains(&self, id: Identifier) -> bool {
        id.0 < self.size()
    }

    /// Clockwise distance from `a` to `b`: `(b - a) mod 2^m`.
    pub fn distance(&self, a: Identifier, b: Identifier) -> u64 {
        b.0.wrapping_sub(a.0) & self.mask()
    }

    /// `(id + 2^i) mod 2^m`, the start of finger entry `i`. Requires `i < m`.
    pub fn add_pow2(&self, id: Identifier, i: u32) -> Identifier {
        debug_assert!(i < self.m, "finger offset {i} out of range for m = {}", self.m);
        self.reduce(id.0.wrapping_add(1u64 << i))
    }

    /// Cyclic interval membership test for `x` against the interval from `a`
    /// to `b`, walking clockwise. When `a == b` the interval spans the whole
    /// ring, so `(a, a]` contains every identifier and `(a, a)` contains every
    /// identifier except `a` itself (the usual Chord convention).
    pub fn in_interval(
        &self,
        x: Identifier,
        a: Identifier,
        b: Identifier,
        inclusive_start: bool,
        inclusive_end: bool,
    ) -> bool {
        if x == a && inclusive_start {
            return true;
        }
        if x == b && inclusive_end {
            return true;
        }
        let span = match self.distance(a, b) {
            0 => self.size(),
            d => d,
        };
        let dx = self.distance(a, x);
        dx > 0 && dx < span
    }

    /// `x` in `(a, b]`, the key-ownership and successor test.
    pub fn in_open_closed(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        self.in_interval(x, a, b, false, true)
    }

    /// `x` in `(a, b)`, the strict betweenness test used by routing,
    /// stabilization and notify.
    pub fn in_open_open(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        self.in_interval(x, a, b, false, false)
    }
}
