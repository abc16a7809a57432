//! Seeded pseudo-random generator.
//!
//! The world owns exactly one [`MatchRng`], seeded from the map. It is part
//! of the serialized state, so a restored snapshot continues the same
//! sequence. Only integer outputs are exposed.

use serde::{Deserialize, Serialize};

/// Mulberry32 generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRng {
    state: u32,
}

impl MatchRng {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current internal state (for hashing).
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform index in `0..len`. Returns 0 when `len` is 0.
    pub fn below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let scaled = (u64::from(self.next_u32()) * len as u64) >> 32;
        scaled as usize
    }
}
