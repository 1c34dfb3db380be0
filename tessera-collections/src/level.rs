//! Random level assignment for skip list nodes.
//!
//! Levels follow a geometric distribution truncated at [`MAX_LEVEL`]: every
//! node gets level 1, and each further promotion happens with probability
//! [`FACTOR_P`]. With `p = 0.25` and 32 levels the list addresses about
//! 2^64 elements while a node carries ~1.33 links on average.
//!
//! The draw counts trailing one bits of a uniform `u64`. Two trailing ones
//! occur with probability 1/4, so one promotion is granted per pair:
//!
//! ```text
//! ...xxxx0   -> level 1   (p = 3/4)
//! ...xx0 11  -> level 2   (p = 3/16)
//! ..0 11 11  -> level 3   (p = 3/64)
//! ```

use rand_core::RngCore;

/// Maximum number of levels a node can participate in.
pub const MAX_LEVEL: usize = 32;

/// Probability that a node at level `i` is promoted to level `i + 1`.
pub const FACTOR_P: f64 = 0.25;

/// Trailing one bits consumed per promotion: `log2(1 / FACTOR_P)`.
const BITS_PER_PROMOTION: u32 = 2;

/// Draws node levels from a caller-supplied random source.
///
/// The generator owns its RNG, so two lists never share random state and a
/// fixed seed reproduces the exact level sequence.
///
/// # Example
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::SmallRng;
/// use tessera_collections::level::{LevelGenerator, MAX_LEVEL};
///
/// let mut a = LevelGenerator::new(SmallRng::seed_from_u64(7));
/// let mut b = LevelGenerator::new(SmallRng::seed_from_u64(7));
///
/// for _ in 0..100 {
///     let level = a.next_level();
///     assert!((1..=MAX_LEVEL).contains(&level));
///     assert_eq!(level, b.next_level());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LevelGenerator<R> {
    rng: R,
}

impl<R: RngCore> LevelGenerator<R> {
    /// Creates a generator drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Returns a level in `[1, MAX_LEVEL]`.
    #[inline]
    pub fn next_level(&mut self) -> usize {
        let promotions = self.rng.next_u64().trailing_ones() / BITS_PER_PROMOTION;
        (promotions as usize + 1).min(MAX_LEVEL)
    }

    /// Consumes the generator, returning the random source.
    pub fn into_inner(self) -> R {
        self.rng
    }
}
