//! Xorshift32 generator for the Random-50% condition

/// Seed used when none is given
pub const DEFAULT_SEED: u32 = 42;

/// Xorshift32 has a fixed point at zero; a zero seed starts here instead.
const ZERO_SEED_REPLACEMENT: u32 = 0x9E37_79B9;

/// Marsaglia xorshift32 (shifts 13, 17, 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Create a generator from a seed
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed };
        Self { state }
    }

    /// Current state
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advance and return the new state
    pub fn next_u32(&mut self) -> u32 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 17;
        s ^= s << 5;
        self.state = s;
        s
    }

    /// Fair coin: true when the next state is even
    pub fn next_bool(&mut self) -> bool {
        self.next_u32() % 2 == 0
    }
}

impl Default for Xorshift32 {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
