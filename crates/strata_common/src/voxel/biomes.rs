//! The builtin biome types.

use std::sync::Arc;

use strata_schemas::dependencies::rgb::RGBA8;
use strata_schemas::registry::RegistryName;
use strata_schemas::voxel::biome::{BiomeDefinition, BiomeKind, BiomeRegistry};
use strata_schemas::voxel::generation::block_structure::BlockStructure;
use strata_schemas::voxel::generation::structure_model::{
    Boulder, GroundPatch, SimpleTree, SimpleVegetation, StructureModel, StructureShape, TreeShape,
};
use strata_schemas::voxel::voxeltypes::{BlockEntry, BlockRegistry};
use tracing::warn;

use super::blocks::*;
use crate::prelude::*;

/// Registry name for ocean.
pub const OCEAN_BIOME_NAME: RegistryName = RegistryName::strata_const("ocean");
/// Registry name for plains.
pub const PLAINS_BIOME_NAME: RegistryName = RegistryName::strata_const("plains");
/// Registry name for forest.
pub const FOREST_BIOME_NAME: RegistryName = RegistryName::strata_const("forest");
/// Registry name for desert.
pub const DESERT_BIOME_NAME: RegistryName = RegistryName::strata_const("desert");
/// Registry name for tundra.
pub const TUNDRA_BIOME_NAME: RegistryName = RegistryName::strata_const("tundra");
/// Registry name for mountains.
pub const MOUNTAINS_BIOME_NAME: RegistryName = RegistryName::strata_const("mountains");
/// Registry name for the common cave biome.
pub const CAVE_BIOME_NAME: RegistryName = RegistryName::strata_const("cave");
/// Registry name for the deep cave biome.
pub const DEEP_CAVE_BIOME_NAME: RegistryName = RegistryName::strata_const("deep_cave");

fn block(blocks: &BlockRegistry, name: &RegistryName) -> Result<BlockEntry> {
    let (id, _) = blocks.require(name.as_ref())?;
    Ok(BlockEntry::new(id, 0))
}

struct BiomeTemplate {
    name: RegistryName,
    kind: BiomeKind,
    heights: (i32, i32),
    chance: u32,
    terrain: (f32, f32, f32),
    layers: &'static [&'static str],
    stone: RegistryName,
    color: RGBA8,
}

/// Installs the base surface and cave biomes.
pub fn setup_basic_biomes(blocks: &BlockRegistry, biome_registry: &mut BiomeRegistry) -> Result<()> {
    let tree = |shape, leaves: &RegistryName, height, height_variation| -> Result<StructureShape> {
        Ok(StructureShape::SimpleTree(SimpleTree {
            shape,
            leaves: block(blocks, leaves)?,
            wood: block(blocks, &OAK_LOG_BLOCK_NAME)?,
            top_wood: block(blocks, &OAK_TOP_BLOCK_NAME)?,
            height,
            height_variation,
        }))
    };
    let plant = |name: &RegistryName, height, height_variation| -> Result<StructureShape> {
        Ok(StructureShape::SimpleVegetation(SimpleVegetation {
            block: block(blocks, name)?,
            height,
            height_variation,
        }))
    };
    let boulder = StructureShape::Boulder(Boulder {
        block: block(blocks, &STONE_BLOCK_NAME)?,
        size: 3.0,
        size_variation: 1.0,
    });
    let gravel_patch = StructureShape::GroundPatch(GroundPatch {
        block: block(blocks, &GRAVEL_BLOCK_NAME)?,
        width: 5.0,
        variation: 2.0,
        depth: 2.0,
        smoothness: 0.4,
    });

    let templates = [
        (
            BiomeTemplate {
                name: OCEAN_BIOME_NAME,
                kind: BiomeKind::Ocean,
                heights: (i32::MIN, 0),
                chance: 10,
                terrain: (4.0, 8.0, 0.0),
                layers: &["2 to 3 strata:sand", "1 to 2 strata:gravel"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(20, 40, 180, 255),
            },
            vec![StructureModel::new(0.01, gravel_patch)],
        ),
        (
            BiomeTemplate {
                name: PLAINS_BIOME_NAME,
                kind: BiomeKind::Grassland,
                heights: (0, 48),
                chance: 10,
                terrain: (2.0, 6.0, 0.0),
                layers: &["strata:grass", "2 to 3 strata:soil"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(20, 180, 10, 255),
            },
            vec![
                StructureModel::new(0.002, tree(TreeShape::Round, &OAK_LEAVES_BLOCK_NAME, 5, 3)?),
                StructureModel::new(0.004, tree(TreeShape::Bush, &BUSH_LEAVES_BLOCK_NAME, 3, 2)?),
                StructureModel::new(0.08, plant(&TALL_GRASS_BLOCK_NAME, 1, 2)?),
            ],
        ),
        (
            BiomeTemplate {
                name: FOREST_BIOME_NAME,
                kind: BiomeKind::Forest,
                heights: (0, 64),
                chance: 8,
                terrain: (3.0, 10.0, 0.0),
                layers: &["strata:grass", "2 to 4 strata:soil"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(15, 110, 10, 255),
            },
            vec![
                StructureModel::new(0.03, tree(TreeShape::Round, &OAK_LEAVES_BLOCK_NAME, 6, 4)?),
                StructureModel::new(0.01, tree(TreeShape::Pyramid, &OAK_LEAVES_BLOCK_NAME, 8, 4)?),
                StructureModel::new(0.02, tree(TreeShape::Bush, &BUSH_LEAVES_BLOCK_NAME, 3, 2)?),
                StructureModel::new(0.05, plant(&TALL_GRASS_BLOCK_NAME, 1, 1)?),
            ],
        ),
        (
            BiomeTemplate {
                name: DESERT_BIOME_NAME,
                kind: BiomeKind::Desert,
                heights: (0, 40),
                chance: 6,
                terrain: (2.0, 12.0, 0.0),
                layers: &["3 to 5 strata:sand"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(220, 200, 120, 255),
            },
            vec![
                StructureModel::new(0.003, plant(&CACTUS_BLOCK_NAME, 2, 3)?),
                StructureModel::new(0.001, boulder),
            ],
        ),
        (
            BiomeTemplate {
                name: TUNDRA_BIOME_NAME,
                kind: BiomeKind::Tundra,
                heights: (24, 96),
                chance: 4,
                terrain: (2.0, 8.0, 12.0),
                layers: &["strata:ice", "1 to 2 strata:gravel"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(200, 220, 230, 255),
            },
            vec![StructureModel::new(0.005, tree(TreeShape::Pyramid, &OAK_LEAVES_BLOCK_NAME, 6, 3)?)],
        ),
        (
            BiomeTemplate {
                name: MOUNTAINS_BIOME_NAME,
                kind: BiomeKind::Mountain,
                heights: (48, i32::MAX),
                chance: 6,
                terrain: (4.0, 16.0, 64.0),
                layers: &["1 to 2 strata:gravel"],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(120, 120, 120, 255),
            },
            vec![
                StructureModel::new(0.004, boulder),
                StructureModel::new(0.01, gravel_patch),
            ],
        ),
        (
            BiomeTemplate {
                name: CAVE_BIOME_NAME,
                kind: BiomeKind::Cave,
                heights: (i32::MIN, i32::MAX),
                chance: 10,
                terrain: (0.0, 0.0, 0.0),
                layers: &[],
                stone: STONE_BLOCK_NAME,
                color: RGBA8::new(70, 70, 70, 255),
            },
            vec![],
        ),
        (
            BiomeTemplate {
                name: DEEP_CAVE_BIOME_NAME,
                kind: BiomeKind::Cave,
                heights: (i32::MIN, -512),
                chance: 6,
                terrain: (0.0, 0.0, 0.0),
                layers: &[],
                stone: GRAVEL_BLOCK_NAME,
                color: RGBA8::new(40, 35, 35, 255),
            },
            vec![],
        ),
    ];

    for (template, vegetation_models) in templates {
        let (min_height, max_height) = template.heights;
        if min_height >= max_height {
            warn!("Biome {} has an empty height window {min_height}..{max_height}", template.name);
        }
        let (roughness, hills, mountains) = template.terrain;
        biome_registry.push_object(Arc::new(BiomeDefinition {
            structure: BlockStructure::parse(template.layers.iter().copied(), blocks)
                .with_context(|| format!("Ground layers of biome {}", template.name))?,
            stone_block: block(blocks, &template.stone)?,
            name: template.name,
            kind: template.kind,
            min_height,
            max_height,
            chance: template.chance,
            roughness,
            hills,
            mountains,
            vegetation_models,
            representative_color: template.color,
        }))?;
    }
    Ok(())
}
