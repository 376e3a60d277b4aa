use std::sync::{Arc, OnceLock};
use std::thread;

use anyhow::{bail, Result};
use bevy_math::IVec3;
use itertools::iproduct;
use quickcheck_macros::quickcheck;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use strata_common::config::WorldGenConfig;
use strata_common::voxel::generator::flat::FlatlandStage;
use strata_common::voxel::generator::terrain::TerrainStage;
use strata_common::voxel::generator::{GenerationContext, GeneratorStage, SurfaceGenerator};
use strata_common::voxel::world::{default_registries, WorldGenerator};
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::map_fragment::MapFragmentKey;
use strata_schemas::voxel::voxeltypes::BlockEntry;

fn flatland_world(seed: u64) -> WorldGenerator {
    let registries = default_registries().unwrap();
    let mut pipeline = SurfaceGenerator::new();
    pipeline
        .register(Box::new(FlatlandStage::grassland(&registries).unwrap()))
        .unwrap();
    WorldGenerator::new_with_pipeline(WorldGenConfig::with_seed(seed), registries, pipeline).unwrap()
}

#[test]
fn flatland_scenario() {
    let world = flatland_world(42);
    let grass = world.registries().block_entry("grass").unwrap();
    let soil = world.registries().block_entry("soil").unwrap();

    let chunk = world.generate_chunk_at(IVec3::ZERO, 1).unwrap();
    for (x, y, z, block) in chunk.iter_voxels() {
        match y {
            2 => assert_eq!(block.id, grass.id, "({x}, {y}, {z})"),
            0 | 1 => assert_eq!(block, soil, "({x}, {y}, {z})"),
            _ => assert!(block.is_empty(), "({x}, {y}, {z})"),
        }
    }
    assert_eq!(chunk, world.generate_chunk_at(IVec3::ZERO, 1).unwrap());
    assert_eq!(chunk, flatland_world(42).generate_chunk_at(IVec3::ZERO, 1).unwrap());
}

#[test]
fn default_world_is_reproducible() {
    let registries = default_registries().unwrap();
    let mut rng = Pcg64::seed_from_u64(0x5eed);
    for _ in 0..4 {
        let seed: u64 = rng.gen();
        let vs = 1 << rng.gen_range(0..4);
        let width = 32 * vs;
        let origin = IVec3::new(rng.gen_range(-8..8), rng.gen_range(-4..2), rng.gen_range(-8..8)) * width;

        let a = WorldGenerator::new(WorldGenConfig::with_seed(seed), registries.clone()).unwrap();
        let b = WorldGenerator::new(WorldGenConfig::with_seed(seed), registries.clone()).unwrap();
        let first = a.generate_chunk_at(origin, vs).unwrap();
        // Warm the cache of the second generator with a neighbouring chunk first.
        b.generate_chunk_at(origin + IVec3::new(width, 0, 0), vs).unwrap();
        let second = b.generate_chunk_at(origin, vs).unwrap();
        assert_eq!(first, second, "seed {seed} at {origin} with voxel size {vs}");
    }
}

#[quickcheck]
fn flatland_matches_height(y_chunk: i8) -> bool {
    static WORLD: OnceLock<WorldGenerator> = OnceLock::new();
    let world = WORLD.get_or_init(|| flatland_world(5));
    let origin = IVec3::new(64, i32::from(y_chunk) * 32, -32);
    let chunk = world.generate_chunk_at(origin, 1).unwrap();
    let soil = world.registries().block_entry("soil").unwrap();
    let all_ok = chunk
        .iter_voxels()
        .all(|(_, y, _, block)| origin.y + y >= 3 || !block.is_empty() && (origin.y + y == 2 || block == soil));
    all_ok
}

struct Failing;

impl GeneratorStage for Failing {
    fn registry_name(&self) -> RegistryName {
        RegistryName::strata("failing")
    }

    fn priority(&self) -> i32 {
        2048
    }

    fn generator_seed(&self) -> u64 {
        1
    }

    fn generate(&self, _seed: u64, chunk: &mut Chunk, _ctx: &GenerationContext) -> Result<()> {
        if chunk.origin().y < 0 {
            bail!("refusing to generate below zero");
        }
        Ok(())
    }
}

#[test]
fn failing_stage_discards_the_chunk() {
    let registries = default_registries().unwrap();
    let mut pipeline = SurfaceGenerator::new();
    pipeline.register(Box::new(TerrainStage::new(&registries).unwrap())).unwrap();
    pipeline.register(Box::new(Failing)).unwrap();
    let world = WorldGenerator::new_with_pipeline(WorldGenConfig::with_seed(3), registries, pipeline).unwrap();

    assert!(world.generate_chunk_at(IVec3::new(0, 0, 0), 1).is_ok());
    let err = world.generate_chunk_at(IVec3::new(0, -32, 0), 1).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("strata:failing"), "{message}");
    assert!(message.contains("refusing to generate below zero"), "{message}");
}

#[test]
fn parallel_generation_matches_sequential() {
    let world = Arc::new(WorldGenerator::new(WorldGenConfig::with_seed(1234), default_registries().unwrap()).unwrap());
    let origins: Vec<IVec3> = (0..8).map(|i| IVec3::new((i % 4) * 32, -32 * (i / 4), 0)).collect();
    let sequential: Vec<Chunk> = origins
        .iter()
        .map(|&o| world.generate_chunk_at(o, 1).unwrap())
        .collect();

    let handles: Vec<_> = origins
        .iter()
        .rev()
        .map(|&origin| {
            let world = world.clone();
            thread::spawn(move || world.generate_chunk_at(origin, 1).unwrap())
        })
        .collect();
    let parallel: Vec<Chunk> = handles.into_iter().rev().map(|h| h.join().unwrap()).collect();
    assert_eq!(sequential, parallel);
}

#[test]
fn land_is_solid_below_the_surface() {
    let world = WorldGenerator::new(WorldGenConfig::with_seed(77), default_registries().unwrap()).unwrap();
    let water = world.registries().block_entry("water").unwrap();

    // A chunk footprint where the whole surface is well above y = 0.
    let footprint = iproduct!(0..8, 0..8)
        .map(|(i, j)| (i * 256, j * 256))
        .find(|&(wx, wz)| {
            let fragment = world.map_fragment(MapFragmentKey::containing(wx, wz, 1)).unwrap();
            iproduct!(0..32, 0..32).all(|(x, z)| fragment.get_height(wx + x, wz + z) > 16.0)
        })
        .expect("no land within 2048 blocks of the origin");

    let chunk = world.generate_chunk_at(IVec3::new(footprint.0, -32, footprint.1), 1).unwrap();
    assert_eq!(chunk.count_blocks(water), 0);
    assert!(chunk.count_blocks(BlockEntry::EMPTY) < 32 * 32 * 32 / 2);
}
