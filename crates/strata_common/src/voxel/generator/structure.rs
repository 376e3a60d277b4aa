//! Surface structures: trees, plants, boulders and ground patches.
//!
//! Fine chunks (voxel size below [`BLUE_NOISE_MAX_VOXEL_SIZE`]) root structures on the points of the
//! [`blue_noise`] pattern, so neighbouring trees keep some distance. Coarser chunks roll every lattice column with the
//! chance scaled up to the area the column stands for.

use rand::Rng;
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::chunk::Chunk;

use super::blue_noise::{self, FEATURE_AREA};
use super::terrain::top_solid_y;
use super::{GenerationContext, GeneratorStage};
use crate::prelude::*;

/// Registry name of [`VegetationStage`].
pub const VEGETATION_STAGE_NAME: RegistryName = RegistryName::strata_const("vegetation");

/// Structures rooted this far outside the chunk may still reach into it.
const MARGIN: i32 = 8;
/// Structures never extend further than this above or below their root.
const MAX_STRUCTURE_EXTENT: i32 = 32;
/// Chunks with a voxel size below this place structures on blue noise points.
pub const BLUE_NOISE_MAX_VOXEL_SIZE: i32 = 4;

/// Places the vegetation models of the surface biomes.
#[derive(Clone, Debug, Default)]
pub struct VegetationStage;

/// Placement chance of a model for one lattice column covering `voxel_size²` full resolution columns.
#[inline]
pub fn lod_chance(chance: f32, voxel_size: i32) -> f32 {
    1.0 - (1.0 - chance).powi(voxel_size * voxel_size)
}

/// Placement chance of a model for one blue noise point, which stands for a whole feature cell.
#[inline]
pub fn blue_noise_chance(chance: f32) -> f32 {
    (chance * FEATURE_AREA as f32).min(1.0)
}

impl VegetationStage {
    /// Rolls the models of the column's biome and places at most one of them on the column.
    fn place_on_column(
        &self,
        seeder: &RegionSeeder,
        chunk: &mut Chunk,
        ctx: &GenerationContext,
        (wx, wz): (i32, i32),
        scale_chance: impl Fn(f32) -> f32,
    ) -> Result<()> {
        let vs = chunk.voxel_size();
        let origin = chunk.origin();
        let height = ctx.surface().get_height(wx, wz);
        let rel_y = top_solid_y(height, vs) + vs - origin.y;
        if rel_y < -MAX_STRUCTURE_EXTENT || rel_y >= chunk.width() + MAX_STRUCTURE_EXTENT {
            return Ok(());
        }
        let biome = ctx.biomes.biome_at(wx, origin.y + rel_y, wz);
        if biome.vegetation_models.is_empty() {
            return Ok(());
        }
        let (px, pz) = (wx - origin.x, wz - origin.z);
        let mut rng = seeder.rng_at_column(wx, wz);
        let mut roll: f32 = rng.gen();
        for model in &biome.vegetation_models {
            let chance = scale_chance(model.chance);
            if roll < chance {
                model
                    .generate(px, pz, rel_y, chunk, ctx.surface(), &mut rng)
                    .with_context(|| format!("Placing {:?} at column ({wx}, {wz})", model.shape))?;
                break;
            }
            // Reuse the roll for the next model, rescaled to what the previous ones left over.
            roll = (roll - chance) / (1.0 - chance);
        }
        Ok(())
    }
}

impl GeneratorStage for VegetationStage {
    fn registry_name(&self) -> RegistryName {
        VEGETATION_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        131072
    }

    fn generator_seed(&self) -> u64 {
        0x2026b65487da9226
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()> {
        let seeder = RegionSeeder::new(seed);
        let vs = chunk.voxel_size();
        let width = chunk.width();
        let origin = chunk.origin();
        let margin = MARGIN.max(vs);
        if vs < BLUE_NOISE_MAX_VOXEL_SIZE {
            let (x, z, span) = (origin.x - margin, origin.z - margin, width + 2 * margin);
            for (wx, wz) in blue_noise::points_in(x, z, span, span) {
                // Points closer than two voxels never share a lattice column.
                let column = (wx & !(vs - 1), wz & !(vs - 1));
                self.place_on_column(&seeder, chunk, ctx, column, blue_noise_chance)?;
            }
        } else {
            for px in (-margin..width + margin).step_by(vs as usize) {
                for pz in (-margin..width + margin).step_by(vs as usize) {
                    let column = (origin.x + px, origin.z + pz);
                    self.place_on_column(&seeder, chunk, ctx, column, |chance| lod_chance(chance, vs))?;
                }
            }
        }
        Ok(())
    }
}
