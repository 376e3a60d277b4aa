//! The staged chunk generator.
//!
//! A [`SurfaceGenerator`] holds an ordered list of [`GeneratorStage`]s. Every chunk runs through all stages in
//! ascending priority order; each stage reads and writes only the chunk it is given and the shared read-only
//! [`GenerationContext`].

use std::fmt::Debug;

use strata_schemas::registries::WorldRegistries;
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::cave_biome_map::CaveBiomeMap;
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::map_fragment::SurfaceMap;
use tracing::{error, info, trace};

use crate::prelude::*;

pub mod blue_noise;
pub mod caves;
pub mod crystal;
pub mod flat;
pub mod ore;
pub mod structure;
pub mod terrain;

/// Everything a stage may read besides the chunk: registries and the surface and biome maps around the chunk.
#[derive(Clone, Debug)]
pub struct GenerationContext {
    /// Block, biome and ore registries of the world.
    pub registries: WorldRegistries,
    /// Surface and underground biomes around the chunk.
    pub biomes: CaveBiomeMap,
    /// World height below which open space is filled with water.
    pub sea_level: i32,
}

impl GenerationContext {
    /// Terrain height and surface biome around the chunk.
    pub fn surface(&self) -> &SurfaceMap {
        self.biomes.surface()
    }
}

/// One pass of chunk generation.
pub trait GeneratorStage: Send + Sync {
    /// Unique name of the stage, used for ordering ties, configuration and error reports.
    fn registry_name(&self) -> RegistryName;

    /// Stages run in ascending priority order.
    fn priority(&self) -> i32;

    /// Salt mixed into the world seed before it is handed to [`Self::generate`].
    fn generator_seed(&self) -> u64;

    /// Generates this stage's part of the chunk.
    ///
    /// `seed` is already the world seed mixed with [`Self::generator_seed`]. Writes must stay within `chunk`.
    fn generate(&self, seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()>;
}

/// An ordered pipeline of generator stages.
#[derive(Default)]
pub struct SurfaceGenerator {
    stages: Vec<Box<dyn GeneratorStage>>,
    finalized: bool,
}

impl Debug for SurfaceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceGenerator")
            .field("stages", &self.stage_names())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl SurfaceGenerator {
    /// An empty pipeline accepting registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage. Fails once the pipeline is finalized or if a stage of the same name is already registered.
    pub fn register(&mut self, stage: Box<dyn GeneratorStage>) -> Result<()> {
        let name = stage.registry_name();
        ensure!(!self.finalized, "Cannot register stage {name} into a finalized pipeline");
        if self.stages.iter().any(|s| s.registry_name() == name) {
            bail!("Generator stage {name} registered twice");
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Sorts the stages by priority, keeping registration order among equal priorities, and locks the pipeline.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.stages.sort_by_key(|s| s.priority());
        self.finalized = true;
        info!(
            "Generator pipeline order: {}",
            self.stages
                .iter()
                .map(|s| format!("{}@{}", s.registry_name(), s.priority()))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    /// Whether [`Self::finalize`] was called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Checks if no stage is registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of the stages in execution order (registration order before finalization).
    pub fn stage_names(&self) -> Vec<RegistryName> {
        self.stages.iter().map(|s| s.registry_name()).collect()
    }

    /// Runs every stage on the chunk, in order.
    ///
    /// The first failing stage aborts the run; the chunk is then partially generated and must be discarded.
    pub fn generate(&self, world_seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()> {
        ensure!(self.finalized, "The generator pipeline must be finalized before generating chunks");
        for stage in &self.stages {
            let name = stage.registry_name();
            trace!(stage = %name, chunk = %chunk.position(), "Running generator stage");
            if let Err(e) = stage.generate(stage_seed(world_seed, stage.generator_seed()), chunk, ctx) {
                let e = e.context(format!(
                    "Generator stage {name} (priority {}) failed on chunk at {} with voxel size {}",
                    stage.priority(),
                    chunk.origin(),
                    chunk.voxel_size()
                ));
                error!("{e:#}");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Iterates `start, start - step, ...` down to and including `end`, for `step > 0`.
pub(crate) fn step_down(start: i32, end: i32, step: i32) -> impl Iterator<Item = i32> {
    debug_assert!(step > 0);
    let count = if start < end { 0 } else { (start - end) / step + 1 };
    (0..count).map(move |i| start - i * step)
}


#[cfg(test)]
mod test {
    use bevy_math::IVec3;

    use super::test_util::*;
    use super::*;

    struct Recorder {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
        fail: bool,
    }

    impl GeneratorStage for Recorder {
        fn registry_name(&self) -> RegistryName {
            RegistryName::strata(self.name)
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn generator_seed(&self) -> u64 {
            0xff
        }

        fn generate(&self, seed: u64, _chunk: &mut Chunk, _ctx: &GenerationContext) -> Result<()> {
            self.log.lock().unwrap().push((self.name, seed));
            if self.fail {
                bail!("boom");
            }
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        priority: i32,
        fail: bool,
        log: &Arc<Mutex<Vec<(&'static str, u64)>>>,
    ) -> Box<dyn GeneratorStage> {
        Box::new(Recorder {
            name,
            priority,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn stages_run_by_priority_then_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = SurfaceGenerator::new();
        pipeline.register(recorder("late", 3, false, &log)).unwrap();
        pipeline.register(recorder("first_tie", 1, false, &log)).unwrap();
        pipeline.register(recorder("second_tie", 1, false, &log)).unwrap();
        assert!(pipeline.register(recorder("late", 0, false, &log)).is_err());
        pipeline.finalize();
        assert!(pipeline.register(recorder("other", 0, false, &log)).is_err());

        let registries = registries();
        let mut chunk = chunk_at(&registries, IVec3::ZERO, 1);
        let ctx = flat_context(&registries, chunk.position(), 0.0);
        pipeline.generate(0x100, &mut chunk, &ctx).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![("first_tie", 0x1ff), ("second_tie", 0x1ff), ("late", 0x1ff)]
        );
    }

    #[test]
    fn failing_stage_aborts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = SurfaceGenerator::new();
        pipeline.register(recorder("a", 1, false, &log)).unwrap();
        pipeline.register(recorder("b", 2, true, &log)).unwrap();
        pipeline.register(recorder("c", 3, false, &log)).unwrap();

        let registries = registries();
        let mut chunk = chunk_at(&registries, IVec3::new(32, -64, 0), 1);
        let ctx = flat_context(&registries, chunk.position(), 0.0);
        assert!(pipeline.generate(1, &mut chunk, &ctx).is_err(), "unfinalized pipeline must refuse");
        pipeline.finalize();
        let err = pipeline.generate(1, &mut chunk, &ctx).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("strata:b"), "{message}");
        assert!(message.contains("priority 2"), "{message}");
        assert!(message.contains("boom"), "{message}");
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn step_down_ranges() {
        assert_eq!(step_down(6, 0, 2).collect::<Vec<_>>(), vec![6, 4, 2, 0]);
        assert_eq!(step_down(5, 0, 2).collect::<Vec<_>>(), vec![5, 3, 1]);
        assert_eq!(step_down(-1, 0, 1).count(), 0);
        assert_eq!(step_down(0, 0, 4).count(), 1);
    }
}
