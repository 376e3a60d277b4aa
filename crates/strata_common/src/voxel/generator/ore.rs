//! Ore veins.

use std::f64::consts::PI;

use rand::Rng;
use strata_schemas::coordinates::{CHUNK_DIM, CHUNK_SHIFT};
use strata_schemas::registry::RegistryName;
use strata_schemas::rng::rng_from_seed;
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::ore::OreDefinition;

use super::{GenerationContext, GeneratorStage};
use crate::prelude::*;

/// Registry name of [`OreStage`].
pub const ORE_STAGE_NAME: RegistryName = RegistryName::strata_const("ore");

/// Places spherical ore veins into full resolution chunks.
///
/// Veins start in 32³ block cells; a chunk considers the veins of its own and the 26 neighbouring cells.
#[derive(Clone, Debug, Default)]
pub struct OreStage;

impl GeneratorStage for OreStage {
    fn registry_name(&self) -> RegistryName {
        ORE_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        32768
    }

    fn generator_seed(&self) -> u64 {
        0x88773787bc9e0105
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()> {
        if chunk.voxel_size() != 1 {
            return Ok(());
        }
        let seeder = RegionSeeder::new(seed);
        let cell = *chunk.origin() >> CHUNK_SHIFT;
        for x in cell.x - 1..=cell.x + 1 {
            for y in cell.y - 1..=cell.y + 1 {
                for z in cell.z - 1..=cell.z + 1 {
                    let cell_seed = seeder.seed_at(x, y, z);
                    let rel = [x - cell.x, y - cell.y, z - cell.z].map(|c| c << CHUNK_SHIFT);
                    for (_, ore) in ctx.registries.ores.iter_ordered() {
                        if ore.max_height <= y << CHUNK_SHIFT {
                            continue;
                        }
                        place_veins(ore, cell_seed, rel, chunk)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Places the veins of one ore starting in the cell at `rel`, relative to the chunk.
fn place_veins(ore: &OreDefinition, cell_seed: u64, rel: [i32; 3], chunk: &mut Chunk) -> Result<()> {
    let mut rng = rng_from_seed(cell_seed ^ ore.seed_salt());
    let mut veins = ore.veins as u32;
    if ore.veins - veins as f32 >= rng.gen::<f32>() {
        veins += 1;
    }
    let width = chunk.width();
    let size = f64::from(CHUNK_DIM);
    for _ in 0..veins {
        let center = rel.map(|c| f64::from(c) + rng.gen::<f64>() * size);
        let volume = (rng.gen::<f64>() + 0.5) * f64::from(ore.size);
        // The density halves towards the edge, so the sphere holds twice the expected volume.
        let expected_volume = 2.0 * volume / f64::from(ore.density);
        let radius = (expected_volume * 3.0 / 4.0 / PI).cbrt();
        // Keyed by world position, so every chunk the vein reaches into thins it out the same way.
        let noise = RegionSeeder::new(rng.gen());

        let x_min = ((center[0] - radius).ceil() as i32).max(0);
        let x_max = ((center[0] + radius).ceil() as i32).min(width);
        let z_min = ((center[2] - radius).ceil() as i32).max(0);
        let z_max = ((center[2] + radius).ceil() as i32).min(width);
        for x in x_min..x_max {
            let dx = (f64::from(x) - center[0]) / radius;
            for z in z_min..z_max {
                let dz = (f64::from(z) - center[2]) / radius;
                let y_extent = radius * (1.0 - dx * dx - dz * dz).max(0.0).sqrt();
                let y_min = ((center[1] - y_extent).ceil() as i32).max(0);
                let y_max = ((center[1] + y_extent).ceil() as i32).min(width);
                for y in y_min..y_max {
                    let dy = (f64::from(y) - center[1]) / radius;
                    let dist = dx * dx + dy * dy + dz * dz;
                    if dist >= 1.0 {
                        continue;
                    }
                    let roll: f64 = noise
                        .rng_at(chunk.world_x(x), chunk.world_y(y), chunk.world_z(z))
                        .gen();
                    if (1.0 - dist) * f64::from(ore.density) >= roll
                        && ore.can_create_vein_in(chunk.get_block(x, y, z)?)
                    {
                        chunk.update_block_in_generation(x, y, z, ore.block)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use bevy_math::IVec3;
    use strata_schemas::voxel::voxeltypes::BlockEntry;

    use super::*;
    use crate::voxel::generator::test_util::*;

    fn stone_chunk(registries: &strata_schemas::registries::WorldRegistries, origin: IVec3, vs: i32) -> Chunk {
        let stone = registries.block_entry("stone").unwrap();
        let mut chunk = chunk_at(registries, origin, vs);
        let width = chunk.width();
        for x in (0..width).step_by(vs as usize) {
            for y in (0..width).step_by(vs as usize) {
                for z in (0..width).step_by(vs as usize) {
                    chunk.update_block_in_generation(x, y, z, stone).unwrap();
                }
            }
        }
        chunk
    }

    #[test]
    fn veins_replace_only_stone() {
        let registries = registries();
        let coal = registries.block_entry("coal_ore").unwrap();
        let iron = registries.block_entry("iron_ore").unwrap();
        let stone = registries.block_entry("stone").unwrap();

        let origin = IVec3::new(0, -96, 0);
        let mut chunk = stone_chunk(&registries, origin, 1);
        // Leave a hole that ores must not fill.
        for y in 0..32 {
            chunk.update_block_in_generation(16, y, 16, BlockEntry::EMPTY).unwrap();
        }
        let ctx = flat_context(&registries, chunk.position(), 100.0);
        let mut total = 0;
        for seed in 0..8 {
            let mut c = chunk.clone();
            OreStage.generate(seed, &mut c, &ctx).unwrap();
            for y in 0..32 {
                assert_eq!(c.get_block(16, y, 16), Ok(BlockEntry::EMPTY));
            }
            total += c.count_blocks(coal) + c.count_blocks(iron);
            assert_eq!(
                c.count_blocks(stone) + c.count_blocks(coal) + c.count_blocks(iron)
                    + c.count_blocks(registries.block_entry("gold_ore").unwrap()),
                32 * 32 * 32 - 32
            );
        }
        assert!(total > 0, "no ore placed in 8 chunks");
    }

    #[test]
    fn deterministic_and_full_resolution_only() {
        let registries = registries();
        let origin = IVec3::new(64, -32, -32);
        let chunk = stone_chunk(&registries, origin, 1);
        let ctx = flat_context(&registries, chunk.position(), 100.0);
        let (mut a, mut b) = (chunk.clone(), chunk.clone());
        OreStage.generate(77, &mut a, &ctx).unwrap();
        OreStage.generate(77, &mut b, &ctx).unwrap();
        assert_eq!(a, b);

        let coarse = stone_chunk(&registries, IVec3::new(0, -64, 0), 2);
        let mut generated = coarse.clone();
        OreStage.generate(77, &mut generated, &ctx).unwrap();
        assert_eq!(coarse, generated);
    }
}
