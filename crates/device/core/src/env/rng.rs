//! Deterministic random source for outcome draws.
//!
//! Every draw is a pure function of a seed, so a session replays
//! identically given the same session seed. Seeds are derived per draw with
//! [`compute_seed`] from the session seed, the activation nonce, the entity
//! and a [`RollContext`] distinguishing independent rolls for one entity.

/// Distinguishes independent rolls made for the same entity in one activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum RollContext {
    Candidate = 0,
    Magnitude = 1,
    OffsetX = 2,
    OffsetZ = 3,
    Cosmetic = 4,
}

/// RNG oracle for deterministic random number generation.
pub trait RngOracle: Send + Sync {
    fn next_u32(&self, seed: u64) -> u32;

    /// Uniform index in `[0, len)`; `len` must be non-zero.
    fn pick(&self, seed: u64, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_u32(seed) as usize) % len.max(1)
    }

    /// Uniform integer in `[min, max)`; returns `min` for an empty range.
    fn below(&self, seed: u64, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        min + self.next_u32(seed) % (max - min)
    }

    /// Uniform float in `[0, 1]`.
    fn unit(&self, seed: u64) -> f32 {
        self.next_u32(seed) as f32 / u32::MAX as f32
    }

    /// Uniform float in `[lo, hi]`.
    fn span(&self, seed: u64, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.unit(seed)
    }
}

/// PCG-XSH-RR generator: 64-bit state, 32-bit output.
#[derive(Clone, Copy, Debug, Default)]
pub struct PcgRng;

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RngOracle for PcgRng {
    fn next_u32(&self, seed: u64) -> u32 {
        Self::pcg_output(Self::pcg_step(seed))
    }
}

/// Derives the seed for one roll.
///
/// * `session_seed` - fixed for the whole session
/// * `nonce` - activation counter of the device
/// * `entity` - entity the roll is for
/// * `context` - which roll this is for that entity
pub fn compute_seed(session_seed: u64, nonce: u64, entity: u64, context: RollContext) -> u64 {
    let mut hash = session_seed;
    hash ^= nonce.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= entity.wrapping_mul(0x517cc1b727220a95);
    hash ^= (context as u64).wrapping_mul(0x85ebca6b);

    // avalanche
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;
    hash
}
