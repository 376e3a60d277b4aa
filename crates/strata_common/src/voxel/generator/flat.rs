//! Simple flat world stage

use strata_schemas::registries::WorldRegistries;
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::voxeltypes::BlockEntry;

use super::{step_down, GenerationContext, GeneratorStage};
use crate::prelude::*;
use crate::voxel::blocks::{GRASS_BLOCK_NAME, SOIL_BLOCK_NAME};

/// Registry name of [`FlatlandStage`].
pub const FLATLAND_STAGE_NAME: RegistryName = RegistryName::strata_const("flatland");

/// A layer of blocks to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlatLayer {
    /// The type of block to fill the layer with.
    pub block_type: BlockEntry,
    /// The thickness of the layer in blocks, must be positive.
    pub thickness: i32,
}

/// A stage that fills the world with flat stacked layers starting at `start_y`.
/// The bottom layer is copied downwards, everything above the top layer stays empty.
#[derive(Clone, Debug)]
pub struct FlatlandStage {
    start_y: i32,
    layers: Vec<FlatLayer>,
}

impl FlatlandStage {
    /// Constructs a stage from the given arguments, returning an error if invalid layers were given.
    pub fn new(start_y: i32, layers: Vec<FlatLayer>) -> Result<Self> {
        if layers.is_empty() {
            bail!("Empty layers given to the flatland stage")
        }
        if layers.iter().any(|l| l.thickness <= 0) {
            bail!("Invalid non-positive thickness layer in {layers:?}");
        }
        Ok(Self { start_y, layers })
    }

    /// Two blocks of soil under one block of grass, starting at y = 0.
    pub fn grassland(registries: &WorldRegistries) -> Result<Self> {
        Self::new(
            0,
            vec![
                FlatLayer {
                    block_type: registries.block(&SOIL_BLOCK_NAME)?,
                    thickness: 2,
                },
                FlatLayer {
                    block_type: registries.block(&GRASS_BLOCK_NAME)?,
                    thickness: 1,
                },
            ],
        )
    }

    /// World height just above the top layer.
    pub fn top_y(&self) -> i32 {
        self.start_y + self.layers.iter().map(|l| l.thickness).sum::<i32>()
    }

    fn layer_for(&self, y: i32) -> Option<FlatLayer> {
        if y < self.start_y {
            return self.layers.first().copied();
        }
        let mut cur_y = self.start_y;
        for layer in self.layers.iter().copied() {
            let end_y = cur_y + layer.thickness;
            if (cur_y..end_y).contains(&y) {
                return Some(layer);
            }
            cur_y = end_y;
        }
        None
    }
}

impl GeneratorStage for FlatlandStage {
    fn registry_name(&self) -> RegistryName {
        FLATLAND_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        1024
    }

    fn generator_seed(&self) -> u64 {
        0x2b1f_8f6a_53c0_7e11
    }

    fn generate(&self, _seed: u64, chunk: &mut Chunk, _ctx: &GenerationContext) -> Result<()> {
        let vs = chunk.voxel_size();
        let width = chunk.width();
        for y in step_down(width - vs, 0, vs) {
            let Some(layer) = self.layer_for(chunk.world_y(y)) else {
                continue;
            };
            for x in (0..width).step_by(vs as usize) {
                for z in (0..width).step_by(vs as usize) {
                    chunk.update_block_in_generation(x, y, z, layer.block_type)?;
                }
            }
        }
        Ok(())
    }
}
