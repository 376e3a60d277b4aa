//! Distribution of underground biomes over cave biome map fragments.

use std::fmt::Debug;
use std::sync::Arc;

use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::biome::{pick_weighted, BiomeDefinition, BiomeRegistry};
use strata_schemas::voxel::cave_biome_map::{
    CaveBiomeMapFragment, CAVE_BIOME_CELLS, CAVE_BIOME_MAP_SIZE, CAVE_BIOME_SIZE,
};
use tracing::warn;

use crate::prelude::*;

/// Registry name of [`RandomBiomeDistribution`].
pub const RANDOM_BIOME_DISTRIBUTION_NAME: RegistryName = RegistryName::strata_const("random_biome_distribution");

/// A pass over a freshly created cave biome map fragment.
pub trait CaveBiomeGenerator: Send + Sync + Debug {
    /// Unique name of the pass.
    fn registry_name(&self) -> RegistryName;

    /// Passes run in ascending priority order.
    fn priority(&self) -> i32;

    /// Salt mixed into the world seed before it is handed to [`Self::generate`].
    fn generator_seed(&self) -> u64;

    /// Fills the cells of the fragment.
    fn generate(&self, seed: u64, fragment: &mut CaveBiomeMapFragment) -> Result<()>;
}

/// Picks a random valid cave biome per cell, weighted by the biomes' chances.
#[derive(Clone, Debug)]
pub struct RandomBiomeDistribution {
    cave_biomes: Vec<Arc<BiomeDefinition>>,
}

impl RandomBiomeDistribution {
    /// Collects the cave biomes of the registry; fails if there are none.
    pub fn new(biomes: &BiomeRegistry) -> Result<Self> {
        let cave_biomes: Vec<_> = biomes
            .iter_ordered()
            .map(|(_, b)| b)
            .filter(|b| b.is_cave())
            .cloned()
            .collect();
        ensure!(!cave_biomes.is_empty(), "No cave biomes registered");
        Ok(Self { cave_biomes })
    }

    /// Cave biomes valid anywhere in `[low, high)`, or the first cave biome if none is.
    fn candidates_in(&self, low: i32, high: i32) -> Vec<Arc<BiomeDefinition>> {
        let candidates: Vec<_> = self
            .cave_biomes
            .iter()
            .filter(|b| b.overlaps(low, high))
            .cloned()
            .collect();
        if candidates.is_empty() {
            warn!(
                "No cave biome is valid between y={low} and y={high}, using {}",
                self.cave_biomes[0].name
            );
            return vec![self.cave_biomes[0].clone()];
        }
        candidates
    }
}

impl CaveBiomeGenerator for RandomBiomeDistribution {
    fn registry_name(&self) -> RegistryName {
        RANDOM_BIOME_DISTRIBUTION_NAME
    }

    fn priority(&self) -> i32 {
        1024
    }

    fn generator_seed(&self) -> u64 {
        765893678349
    }

    fn generate(&self, seed: u64, fragment: &mut CaveBiomeMapFragment) -> Result<()> {
        let origin = fragment.origin();
        let mut rng = RegionSeeder::new(seed).rng_at(origin.x, origin.y, origin.z);
        let in_fragment = self.candidates_in(origin.y, origin.y + CAVE_BIOME_MAP_SIZE);
        for cy in 0..CAVE_BIOME_CELLS {
            let low = origin.y + cy * CAVE_BIOME_SIZE;
            let mut layer: Vec<_> = in_fragment
                .iter()
                .filter(|b| b.overlaps(low, low + CAVE_BIOME_SIZE))
                .cloned()
                .collect();
            if layer.is_empty() {
                warn!(
                    "No cave biome covers heights {low}..{} of the fragment at {origin}, falling back to {}",
                    low + CAVE_BIOME_SIZE,
                    in_fragment[0].name
                );
                layer.push(in_fragment[0].clone());
            }
            for cx in 0..CAVE_BIOME_CELLS {
                for cz in 0..CAVE_BIOME_CELLS {
                    let biome = pick_weighted(&layer, |b| b.chance, &mut rng)
                        .ok_or_else(|| anyhow!("No cave biome candidate at layer {cy}"))?;
                    fragment.set_cell(cx, cy, cz, biome.clone());
                }
            }
        }
        Ok(())
    }
}
