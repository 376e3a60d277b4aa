//! Deterministic random number streams for the generator stages.
//!
//! Every random decision in world generation is derived from the world seed, a per-stage salt and
//! the world coordinates the decision is about, so regenerating a chunk always yields the same voxels.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// The random number generator used throughout world generation.
pub type GenRng = Xoshiro256StarStar;

/// Mixes a stage salt into the world seed.
#[inline]
pub const fn stage_seed(world_seed: u64, salt: u64) -> u64 {
    world_seed ^ salt
}

/// Creates a generator stream from a plain seed.
#[inline]
pub fn rng_from_seed(seed: u64) -> GenRng {
    GenRng::seed_from_u64(seed)
}

/// Derives per-region random streams from a seed, so that the same region always gets the same stream
/// no matter in which order regions are visited.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegionSeeder {
    multipliers: [u64; 3],
}

impl RegionSeeder {
    /// Draws the coordinate multipliers from the given seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = rng_from_seed(seed);
        // Odd multipliers keep every coordinate bit relevant.
        let multipliers = [rng.gen::<u64>() | 1, rng.gen::<u64>() | 1, rng.gen::<u64>() | 1];
        Self { multipliers }
    }

    /// Mixed seed for the region at the given coordinates.
    #[inline]
    pub fn seed_at(&self, x: i32, y: i32, z: i32) -> u64 {
        let [mx, my, mz] = self.multipliers;
        (x as i64 as u64).wrapping_mul(mx) ^ (y as i64 as u64).wrapping_mul(my) ^ (z as i64 as u64).wrapping_mul(mz)
    }

    /// A fresh random stream for the region at the given coordinates.
    #[inline]
    pub fn rng_at(&self, x: i32, y: i32, z: i32) -> GenRng {
        rng_from_seed(self.seed_at(x, y, z))
    }

    /// A fresh random stream for the column at the given horizontal coordinates.
    #[inline]
    pub fn rng_at_column(&self, x: i32, z: i32) -> GenRng {
        self.rng_at(x, 0, z)
    }
}
