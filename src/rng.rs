//! Seeded pseudorandom number generator shared by every generative algorithm.
//!
//! All randomness in the sequencer routes through a single [`Rng`] owned by
//! the core, so a saved 64-bit seed reproduces an entire session exactly.
//! Xorshift64 with a multiplicative finalizer (xorshift64star): fast, small
//! state, and nowhere near cryptographic, which is fine for melodies.

/// Substituted for a zero seed, which would wedge xorshift at zero forever.
const ZERO_SEED_REPLACEMENT: u64 = 0x9E37_79B9_7F4A_7C15;

const FINALIZER: u64 = 0x2545_F491_4F6C_DD1D;

/// Reseedable xorshift64star generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Pass the same seed to get the same stream back again. A zero seed is
    /// replaced with a fixed non-zero constant, not rejected.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed },
        }
    }

    /// Re-seed in place. Same zero-seed substitution as [`Rng::new`].
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(FINALIZER)
    }

    /// Uniform float in `[0, 1)`, mapped from the high 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform float in `[0, 1)` as f32, for per-sample CV math.
    pub fn next_f32(&mut self) -> f32 {
        self.next_f64() as f32
    }

    /// Uniform integer in `[0, bound)` via modulo. The modulo bias is accepted;
    /// bounds here are tiny (step counts, table sizes).
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as u32
    }

    /// Coin flip with probability `p` of returning true.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(ZERO_SEED_REPLACEMENT)
    }
}
