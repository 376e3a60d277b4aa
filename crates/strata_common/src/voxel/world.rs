//! The world generator: owns the pipeline and the map caches, and turns chunk positions into chunks.

use std::num::NonZeroUsize;
use std::time::Instant;

use bevy_math::IVec3;
use itertools::{iproduct, Itertools};
use lru::LruCache;
use strata_schemas::coordinates::{AbsBlockPos, ChunkPosition};
use strata_schemas::registries::WorldRegistries;
use strata_schemas::voxel::biome::{BiomeDefinition, BiomeRegistry};
use strata_schemas::voxel::cave_biome_map::{CaveBiomeMap, CaveBiomeMapFragment, CAVE_BIOME_MAP_SIZE};
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::map_fragment::{MapFragment, MapFragmentKey, SurfaceMap};
use strata_schemas::voxel::ore::OreRegistry;
use tracing::{debug, info, warn};

use crate::config::WorldGenConfig;
use crate::prelude::*;
use crate::voxel::biome_distribution::{CaveBiomeGenerator, RandomBiomeDistribution};
use crate::voxel::biomes::setup_basic_biomes;
use crate::voxel::blocks::basic_block_registry;
use crate::voxel::generator::caves::{FractalCaveStage, NoiseCaveStage};
use crate::voxel::generator::crystal::CrystalCavernStage;
use crate::voxel::generator::ore::OreStage;
use crate::voxel::generator::structure::VegetationStage;
use crate::voxel::generator::terrain::TerrainStage;
use crate::voxel::generator::{GenerationContext, GeneratorStage, SurfaceGenerator};
use crate::voxel::map_generator::MapGenerator;
use crate::voxel::ores::setup_basic_ores;

/// Registries holding the builtin blocks, biomes and ores.
pub fn default_registries() -> Result<WorldRegistries> {
    let blocks = basic_block_registry()?;
    let mut biomes = BiomeRegistry::default();
    setup_basic_biomes(&blocks, &mut biomes)?;
    let mut ores = OreRegistry::default();
    setup_basic_ores(&blocks, &mut ores)?;
    Ok(WorldRegistries::new(blocks, biomes, ores))
}

/// The builtin stages, minus the ones switched off in the configuration, finalized.
pub fn default_pipeline(config: &WorldGenConfig, registries: &WorldRegistries) -> Result<SurfaceGenerator> {
    let mut stages: Vec<Box<dyn GeneratorStage>> = vec![Box::new(TerrainStage::new(registries)?), Box::new(OreStage)];
    if config.generate_caves {
        stages.push(Box::new(FractalCaveStage));
        stages.push(Box::new(NoiseCaveStage::default()));
        stages.push(Box::new(CrystalCavernStage::new(registries)?));
    }
    if config.generate_structures {
        stages.push(Box::new(VegetationStage));
    }

    let known: Vec<String> = stages.iter().map(|s| s.registry_name().to_string()).collect();
    for disabled in &config.disabled_stages {
        if !known.contains(disabled) {
            warn!("Unknown generator stage {disabled} in the disabled stage list");
        }
    }

    let mut pipeline = SurfaceGenerator::new();
    for stage in stages {
        if config.is_stage_enabled(&stage.registry_name().to_string()) {
            pipeline.register(stage)?;
        }
    }
    pipeline.finalize();
    Ok(pipeline)
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Generates chunks of one world. Shared between threads; every chunk is a pure function of the seed,
/// the registries and the chunk position.
pub struct WorldGenerator {
    config: WorldGenConfig,
    registries: WorldRegistries,
    pipeline: SurfaceGenerator,
    map_generator: MapGenerator,
    cave_biome_generators: Vec<Box<dyn CaveBiomeGenerator>>,
    default_cave_biome: Arc<BiomeDefinition>,
    map_cache: Mutex<LruCache<MapFragmentKey, Arc<MapFragment>>>,
    cave_biome_cache: Mutex<LruCache<IVec3, Arc<CaveBiomeMapFragment>>>,
}

impl std::fmt::Debug for WorldGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldGenerator")
            .field("config", &self.config)
            .field("registries", &self.registries)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl WorldGenerator {
    /// A generator running the builtin pipeline.
    pub fn new(config: WorldGenConfig, registries: WorldRegistries) -> Result<Self> {
        let pipeline = default_pipeline(&config, &registries)?;
        Self::new_with_pipeline(config, registries, pipeline)
    }

    /// A generator running a custom pipeline, which is finalized if it was not yet.
    pub fn new_with_pipeline(
        config: WorldGenConfig,
        registries: WorldRegistries,
        mut pipeline: SurfaceGenerator,
    ) -> Result<Self> {
        pipeline.finalize();
        let map_generator = MapGenerator::new(config.seed, &registries.biomes)?;
        let default_cave_biome = registries
            .biomes
            .iter_ordered()
            .map(|(_, b)| b)
            .find(|b| b.is_cave())
            .cloned()
            .ok_or_else(|| anyhow!("No cave biomes registered"))?;
        let mut cave_biome_generators: Vec<Box<dyn CaveBiomeGenerator>> =
            vec![Box::new(RandomBiomeDistribution::new(&registries.biomes)?)];
        cave_biome_generators.sort_by_key(|g| g.priority());

        info!(
            "Created world generator with seed {}, {} stages, map cache {} and cave biome cache {}",
            config.seed,
            pipeline.len(),
            config.map_cache_capacity,
            config.cave_biome_cache_capacity
        );
        Ok(Self {
            map_cache: Mutex::new(LruCache::new(cache_capacity(config.map_cache_capacity))),
            cave_biome_cache: Mutex::new(LruCache::new(cache_capacity(config.cave_biome_cache_capacity))),
            config,
            registries,
            pipeline,
            map_generator,
            cave_biome_generators,
            default_cave_biome,
        })
    }

    /// The world seed.
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    /// The configuration the generator was created with.
    pub fn config(&self) -> &WorldGenConfig {
        &self.config
    }

    /// The registries chunks are generated with.
    pub fn registries(&self) -> &WorldRegistries {
        &self.registries
    }

    /// The finalized stage pipeline.
    pub fn pipeline(&self) -> &SurfaceGenerator {
        &self.pipeline
    }

    /// The surface map fragment with the given key, generated on a cache miss.
    pub fn map_fragment(&self, key: MapFragmentKey) -> Result<Arc<MapFragment>> {
        {
            let mut cache = self
                .map_cache
                .lock()
                .map_err(|_| anyhow!("Map fragment cache lock poisoned"))?;
            if let Some(fragment) = cache.get(&key) {
                return Ok(fragment.clone());
            }
        }
        // Generated without holding the lock, a concurrent miss on the same key yields an identical fragment.
        let start = Instant::now();
        let fragment = Arc::new(self.map_generator.generate_fragment(key)?);
        debug!(
            "Generated map fragment at ({}, {}) with voxel size {} in {:?}",
            key.wx,
            key.wz,
            key.voxel_size,
            start.elapsed()
        );
        self.map_cache
            .lock()
            .map_err(|_| anyhow!("Map fragment cache lock poisoned"))?
            .put(key, fragment.clone());
        Ok(fragment)
    }

    /// The cave biome map fragment with the given origin, generated on a cache miss.
    pub fn cave_biome_fragment(&self, origin: IVec3) -> Result<Arc<CaveBiomeMapFragment>> {
        let origin = CaveBiomeMapFragment::origin_containing(origin.x, origin.y, origin.z);
        {
            let mut cache = self
                .cave_biome_cache
                .lock()
                .map_err(|_| anyhow!("Cave biome cache lock poisoned"))?;
            if let Some(fragment) = cache.get(&origin) {
                return Ok(fragment.clone());
            }
        }
        let start = Instant::now();
        let mut fragment = CaveBiomeMapFragment::new(origin, self.default_cave_biome.clone());
        for generator in &self.cave_biome_generators {
            generator
                .generate(stage_seed(self.config.seed, generator.generator_seed()), &mut fragment)
                .with_context(|| {
                    format!(
                        "Cave biome generator {} failed on the fragment at {origin}",
                        generator.registry_name()
                    )
                })?;
        }
        let fragment = Arc::new(fragment);
        debug!("Generated cave biome fragment at {origin} in {:?}", start.elapsed());
        self.cave_biome_cache
            .lock()
            .map_err(|_| anyhow!("Cave biome cache lock poisoned"))?
            .put(origin, fragment.clone());
        Ok(fragment)
    }

    /// Builds the surface and biome maps around a chunk.
    pub fn context_for(&self, position: ChunkPosition) -> Result<GenerationContext> {
        let origin = *position.origin();
        let width = position.width();
        let vs = position.voxel_size();

        // The chunk footprint plus one chunk width on each side, for structures rooted outside the chunk.
        let fragment_width = MapFragmentKey::width_at(vs);
        let step = width.min(fragment_width) as usize;
        let map_keys = iproduct!(
            (origin.x - width..origin.x + 2 * width).step_by(step),
            (origin.z - width..origin.z + 2 * width).step_by(step)
        )
        .map(|(wx, wz)| MapFragmentKey::containing(wx, wz, vs))
        .unique()
        .collect_vec();
        let fragments = map_keys
            .into_iter()
            .map(|key| self.map_fragment(key))
            .collect::<Result<Vec<_>>>()?;
        let surface = SurfaceMap::new(fragments).ok_or_else(|| anyhow!("No map fragments cover {position}"))?;

        let last = origin + IVec3::splat(width - 1);
        let cave_step = CAVE_BIOME_MAP_SIZE.min(width) as usize;
        let cave_origins = iproduct!(
            (origin.x..=last.x).step_by(cave_step),
            (origin.y..=last.y).step_by(cave_step),
            (origin.z..=last.z).step_by(cave_step)
        )
        .map(|(x, y, z)| CaveBiomeMapFragment::origin_containing(x, y, z))
        .unique()
        .collect_vec();
        let caves = cave_origins
            .into_iter()
            .map(|o| self.cave_biome_fragment(o))
            .collect::<Result<Vec<_>>>()?;
        let biomes =
            CaveBiomeMap::new(surface, caves).ok_or_else(|| anyhow!("No cave biome fragments cover {position}"))?;

        Ok(GenerationContext {
            registries: self.registries.clone(),
            biomes,
            sea_level: self.config.sea_level,
        })
    }

    /// Generates the chunk at the given position.
    ///
    /// The chunk is only returned if every stage succeeded.
    pub fn generate_chunk(&self, position: ChunkPosition) -> Result<Chunk> {
        let start = Instant::now();
        let ctx = self
            .context_for(position)
            .with_context(|| format!("Building the maps around {position}"))?;
        let mut chunk = Chunk::new(position, self.registries.blocks.clone());
        self.pipeline.generate(self.config.seed, &mut chunk, &ctx)?;
        debug!("Generated {position} in {:?}", start.elapsed());
        Ok(chunk)
    }

    /// Validates the origin and voxel size, then generates the chunk.
    pub fn generate_chunk_at(&self, origin: IVec3, voxel_size: i32) -> Result<Chunk> {
        let position = ChunkPosition::new(AbsBlockPos::from_ivec3(origin), voxel_size)?;
        self.generate_chunk(position)
    }
}

#[cfg(test)]
mod test {
    use strata_schemas::voxel::voxeltypes::BlockEntry;

    use super::*;
    use crate::voxel::generator::caves::NOISE_CAVE_STAGE_NAME;
    use crate::voxel::generator::ore::ORE_STAGE_NAME;
    use crate::voxel::generator::structure::VEGETATION_STAGE_NAME;
    use crate::voxel::generator::terrain::TERRAIN_STAGE_NAME;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn generator_is_shareable() {
        assert_send_sync::<WorldGenerator>();
    }

    #[test]
    fn configuration_shapes_the_pipeline() {
        let registries = default_registries().unwrap();
        let full = default_pipeline(&WorldGenConfig::default(), &registries).unwrap();
        assert_eq!(full.len(), 6);
        assert_eq!(full.stage_names()[0], TERRAIN_STAGE_NAME);
        assert_eq!(full.stage_names()[5], VEGETATION_STAGE_NAME);

        let config = WorldGenConfig {
            generate_caves: false,
            generate_structures: false,
            disabled_stages: vec![ORE_STAGE_NAME.to_string(), "strata:nonexistent".to_owned()],
            ..Default::default()
        };
        let trimmed = default_pipeline(&config, &registries).unwrap();
        assert_eq!(trimmed.stage_names(), vec![TERRAIN_STAGE_NAME]);

        let config = WorldGenConfig {
            disabled_stages: vec![NOISE_CAVE_STAGE_NAME.to_string()],
            ..Default::default()
        };
        let pipeline = default_pipeline(&config, &registries).unwrap();
        assert!(!pipeline.stage_names().contains(&NOISE_CAVE_STAGE_NAME));
        assert_eq!(pipeline.len(), 5);
    }

    #[test]
    fn fragments_are_cached() {
        let config = WorldGenConfig {
            map_cache_capacity: 2,
            ..WorldGenConfig::with_seed(5)
        };
        let world = WorldGenerator::new(config, default_registries().unwrap()).unwrap();
        let key = MapFragmentKey::containing(0, 0, 4);
        let a = world.map_fragment(key).unwrap();
        let b = world.map_fragment(key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = world.cave_biome_fragment(IVec3::new(5, -5, 5)).unwrap();
        let d = world.cave_biome_fragment(IVec3::new(100, -100, 100)).unwrap();
        assert!(Arc::ptr_eq(&c, &d));
        assert_eq!(c.origin(), IVec3::new(0, -2048, 0));
    }

    #[test]
    fn chunks_are_deterministic_across_generators() {
        let registries = default_registries().unwrap();
        let a = WorldGenerator::new(WorldGenConfig::with_seed(11), registries.clone()).unwrap();
        let b = WorldGenerator::new(WorldGenConfig::with_seed(11), registries).unwrap();
        for (origin, vs) in [(IVec3::new(0, -32, 0), 1), (IVec3::new(-256, -256, 512), 8)] {
            let first = a.generate_chunk_at(origin, vs).unwrap();
            let second = b.generate_chunk_at(origin, vs).unwrap();
            assert_eq!(first, second);
            assert!(first.count_blocks(BlockEntry::EMPTY) < 32 * 32 * 32, "{origin} is empty");
        }
    }

    #[test]
    fn invalid_positions_are_rejected() {
        let world = WorldGenerator::new(WorldGenConfig::default(), default_registries().unwrap()).unwrap();
        assert!(world.generate_chunk_at(IVec3::new(3, 0, 0), 1).is_err());
        assert!(world.generate_chunk_at(IVec3::ZERO, 3).is_err());
    }
}
