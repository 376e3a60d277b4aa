//! The basic terrain: water, the biome's ground layers and stone.

use strata_schemas::registries::WorldRegistries;
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::voxeltypes::BlockEntry;

use super::{step_down, GenerationContext, GeneratorStage};
use crate::prelude::*;
use crate::voxel::blocks::WATER_BLOCK_NAME;

/// Registry name of [`TerrainStage`].
pub const TERRAIN_STAGE_NAME: RegistryName = RegistryName::strata_const("terrain");

/// World height of the topmost solid voxel of a column with the given surface height, on the voxel lattice.
///
/// Blocks strictly below `floor(height)` are ground.
#[inline]
pub fn top_solid_y(height: f32, voxel_size: i32) -> i32 {
    let first_air = height.floor() as i32;
    (first_air - 1) & !(voxel_size - 1)
}

/// Generates the basic terrain shape from the surface map.
#[derive(Clone, Debug)]
pub struct TerrainStage {
    water: BlockEntry,
}

impl TerrainStage {
    /// Resolves the blocks used by the stage.
    pub fn new(registries: &WorldRegistries) -> Result<Self> {
        Ok(Self {
            water: registries.block(&WATER_BLOCK_NAME)?,
        })
    }
}

impl GeneratorStage for TerrainStage {
    fn registry_name(&self) -> RegistryName {
        TERRAIN_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        1024
    }

    fn generator_seed(&self) -> u64 {
        0x65c7f9fdc0641f94
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()> {
        let seeder = RegionSeeder::new(seed);
        let vs = chunk.voxel_size();
        let width = chunk.width();
        let origin = chunk.origin();
        for x in (0..width).step_by(vs as usize) {
            for z in (0..width).step_by(vs as usize) {
                let (wx, wz) = (origin.x + x, origin.z + z);
                let top = top_solid_y(ctx.surface().get_height(wx, wz), vs) - origin.y;

                // Open space above the ground.
                for y in step_down(width - vs, (top + vs).max(0), vs) {
                    if origin.y + y < ctx.sea_level {
                        chunk.update_block_in_generation(x, y, z, self.water)?;
                    }
                }
                if top < 0 {
                    continue;
                }

                // The column stream only depends on the column, so every chunk of it consumes the same layers.
                let mut rng = seeder.rng_at_column(wx, wz);
                let biome = ctx.surface().get_biome(wx, wz);
                let below = biome.structure.add_sub_terranian(chunk, top, -vs, x, z, &mut rng)?;
                for y in step_down(below.min(width - vs), 0, vs) {
                    let stone = ctx.biomes.biome_at(wx, origin.y + y, wz).stone_block;
                    chunk.update_block_in_generation(x, y, z, stone)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use bevy_math::IVec3;

    use super::*;
    use crate::voxel::generator::test_util::*;

    #[test]
    fn surface_lattice() {
        assert_eq!(top_solid_y(3.0, 1), 2);
        assert_eq!(top_solid_y(3.7, 1), 2);
        assert_eq!(top_solid_y(3.0, 2), 2);
        assert_eq!(top_solid_y(3.0, 4), 0);
        assert_eq!(top_solid_y(0.0, 4), -4);
        assert_eq!(top_solid_y(-0.5, 1), -2);
    }

    #[test]
    fn grass_soil_and_stone() {
        let registries = registries();
        let stage = TerrainStage::new(&registries).unwrap();
        let grass = registries.block_entry("grass").unwrap();
        let soil = registries.block_entry("soil").unwrap();
        let stone = registries.block_entry("stone").unwrap();

        let mut chunk = chunk_at(&registries, IVec3::ZERO, 1);
        let ctx = flat_context(&registries, chunk.position(), 20.0);
        stage.generate(11, &mut chunk, &ctx).unwrap();
        for (x, z) in [(0, 0), (5, 17), (31, 31)] {
            assert_eq!(chunk.get_block(x, 19, z).unwrap().id, grass.id);
            assert_eq!(chunk.get_block(x, 18, z), Ok(soil));
            assert_eq!(chunk.get_block(x, 17, z), Ok(soil));
            assert_eq!(chunk.get_block(x, 20, z), Ok(BlockEntry::EMPTY));
            assert_eq!(chunk.get_block(x, 0, z), Ok(stone));
            assert_eq!(chunk.get_block(x, 14, z), Ok(stone));
        }
    }

    #[test]
    fn stacked_chunks_agree_on_layers() {
        let registries = registries();
        let stage = TerrainStage::new(&registries).unwrap();
        let soil = registries.block_entry("soil").unwrap();
        let grass = registries.block_entry("grass").unwrap();

        // The surface is at the very bottom of the upper chunk, the soil continues in the lower one.
        let mut upper = chunk_at(&registries, IVec3::new(0, 32, 0), 1);
        let mut lower = chunk_at(&registries, IVec3::ZERO, 1);
        let ctx = flat_context(&registries, upper.position(), 33.0);
        stage.generate(5, &mut upper, &ctx).unwrap();
        stage.generate(5, &mut lower, &ctx).unwrap();
        for x in 0..32 {
            for z in 0..32 {
                assert_eq!(upper.get_block(x, 0, z).unwrap().id, grass.id);
                let soil_depth = (29..32).filter(|&y| lower.get_block(x, y, z) == Ok(soil)).count();
                assert!((2..=3).contains(&soil_depth), "soil depth {soil_depth}");
            }
        }
    }

    #[test]
    fn water_below_sea_level() {
        let registries = registries();
        let stage = TerrainStage::new(&registries).unwrap();
        let water = registries.block_entry("water").unwrap();

        let mut chunk = chunk_at(&registries, IVec3::new(0, 0, 64), 4);
        let mut ctx = flat_context(&registries, chunk.position(), 8.0);
        ctx.sea_level = 32;
        stage.generate(1, &mut chunk, &ctx).unwrap();
        assert_eq!(chunk.get_block(0, 28, 0), Ok(water));
        assert_eq!(chunk.get_block(0, 8, 0), Ok(water));
        assert_eq!(chunk.get_block(0, 32, 0), Ok(BlockEntry::EMPTY));
        assert_ne!(chunk.get_block(0, 4, 0), Ok(water));
    }

    #[test]
    fn coarse_voxels_stay_on_lattice() {
        let registries = registries();
        let stage = TerrainStage::new(&registries).unwrap();
        for vs in [2, 8, 32] {
            let mut chunk = chunk_at(&registries, IVec3::ZERO, vs);
            let ctx = flat_context(&registries, chunk.position(), 40.0);
            stage.generate(3, &mut chunk, &ctx).unwrap();
            assert_eq!(chunk.get_block(0, 0, 0).map(|b| b.is_empty()), Ok(false));
            assert_eq!(chunk.get_block(0, chunk.width() - vs, 0), Ok(BlockEntry::EMPTY));
        }
    }
}
