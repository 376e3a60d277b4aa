//! The builtin block types.

use strata_schemas::dependencies::rgb::RGBA8;
use strata_schemas::registry::{RegistryError, RegistryName};
use strata_schemas::voxel::voxeltypes::{new_block_registry, BlockDefinition, BlockRegistry};

/// Plain underground rock.
pub const STONE_BLOCK_NAME: RegistryName = RegistryName::strata_const("stone");
/// Subsoil.
pub const SOIL_BLOCK_NAME: RegistryName = RegistryName::strata_const("soil");
/// Topsoil of grassy biomes.
pub const GRASS_BLOCK_NAME: RegistryName = RegistryName::strata_const("grass");
/// Desert and beach ground.
pub const SAND_BLOCK_NAME: RegistryName = RegistryName::strata_const("sand");
/// Loose rock of mountains and sea floors.
pub const GRAVEL_BLOCK_NAME: RegistryName = RegistryName::strata_const("gravel");
/// Unbreakable rock.
pub const BEDROCK_BLOCK_NAME: RegistryName = RegistryName::strata_const("bedrock");
/// Fills empty space below sea level.
pub const WATER_BLOCK_NAME: RegistryName = RegistryName::strata_const("water");
/// Frozen water.
pub const ICE_BLOCK_NAME: RegistryName = RegistryName::strata_const("ice");
/// Tree trunks.
pub const OAK_LOG_BLOCK_NAME: RegistryName = RegistryName::strata_const("oak_log");
/// The topmost trunk voxel of a tree.
pub const OAK_TOP_BLOCK_NAME: RegistryName = RegistryName::strata_const("oak_top");
/// Tree leaves.
pub const OAK_LEAVES_BLOCK_NAME: RegistryName = RegistryName::strata_const("oak_leaves");
/// Bush leaves.
pub const BUSH_LEAVES_BLOCK_NAME: RegistryName = RegistryName::strata_const("bush_leaves");
/// Single voxel plant.
pub const TALL_GRASS_BLOCK_NAME: RegistryName = RegistryName::strata_const("tall_grass");
/// Desert plant.
pub const CACTUS_BLOCK_NAME: RegistryName = RegistryName::strata_const("cactus");
/// Common ore.
pub const COAL_ORE_BLOCK_NAME: RegistryName = RegistryName::strata_const("coal_ore");
/// Medium depth ore.
pub const IRON_ORE_BLOCK_NAME: RegistryName = RegistryName::strata_const("iron_ore");
/// Deep ore.
pub const GOLD_ORE_BLOCK_NAME: RegistryName = RegistryName::strata_const("gold_ore");

/// Colours of the glow crystals of crystal caverns, see [`glow_crystal_name`].
pub const GLOW_CRYSTAL_COLORS: [(&str, RGBA8); 16] = [
    ("red", RGBA8::new(230, 40, 40, 255)),
    ("orange", RGBA8::new(240, 140, 30, 255)),
    ("yellow", RGBA8::new(240, 230, 40, 255)),
    ("green", RGBA8::new(40, 220, 60, 255)),
    ("cyan", RGBA8::new(40, 220, 220, 255)),
    ("blue", RGBA8::new(50, 80, 240, 255)),
    ("violet", RGBA8::new(150, 60, 230, 255)),
    ("purple", RGBA8::new(190, 40, 170, 255)),
    ("dark_red", RGBA8::new(130, 20, 20, 255)),
    ("dark_green", RGBA8::new(20, 110, 30, 255)),
    ("light_blue", RGBA8::new(140, 190, 250, 255)),
    ("brown", RGBA8::new(130, 80, 40, 255)),
    ("white", RGBA8::new(240, 240, 240, 255)),
    ("gray", RGBA8::new(150, 150, 150, 255)),
    ("dark_gray", RGBA8::new(80, 80, 80, 255)),
    ("black", RGBA8::new(25, 25, 25, 255)),
];

/// Registry name of the glow crystal of the given colour.
pub fn glow_crystal_name(color: &str) -> RegistryName {
    RegistryName::strata(&format!("glow_crystal_{color}"))
}

/// Installs the base set of blocks into the given block registry, which must already contain the empty block.
pub fn setup_basic_blocks(registry: &mut BlockRegistry) -> Result<(), RegistryError> {
    let solid = [
        (STONE_BLOCK_NAME, RGBA8::new(100, 100, 100, 255)),
        (GRAVEL_BLOCK_NAME, RGBA8::new(130, 120, 115, 255)),
        (BEDROCK_BLOCK_NAME, RGBA8::new(30, 30, 30, 255)),
        (ICE_BLOCK_NAME, RGBA8::new(170, 210, 250, 255)),
        (OAK_LOG_BLOCK_NAME, RGBA8::new(100, 70, 30, 255)),
        (OAK_TOP_BLOCK_NAME, RGBA8::new(120, 85, 40, 255)),
        (CACTUS_BLOCK_NAME, RGBA8::new(60, 140, 40, 255)),
        (COAL_ORE_BLOCK_NAME, RGBA8::new(50, 50, 50, 255)),
        (IRON_ORE_BLOCK_NAME, RGBA8::new(160, 120, 100, 255)),
        (GOLD_ORE_BLOCK_NAME, RGBA8::new(220, 190, 60, 255)),
    ];
    for (name, color) in solid {
        registry.push_object(BlockDefinition::solid(name, color))?;
    }
    registry.push_object(BlockDefinition::solid(SOIL_BLOCK_NAME, RGBA8::new(110, 81, 0, 255)).stackable())?;
    registry.push_object(BlockDefinition::solid(GRASS_BLOCK_NAME, RGBA8::new(30, 200, 30, 255)).stackable())?;
    registry.push_object(BlockDefinition::solid(SAND_BLOCK_NAME, RGBA8::new(220, 200, 130, 255)).stackable())?;
    registry.push_object(BlockDefinition::fluid(WATER_BLOCK_NAME, RGBA8::new(30, 60, 220, 160)))?;
    for (name, color) in [
        (OAK_LEAVES_BLOCK_NAME, RGBA8::new(40, 150, 30, 220)),
        (BUSH_LEAVES_BLOCK_NAME, RGBA8::new(60, 130, 40, 220)),
        (TALL_GRASS_BLOCK_NAME, RGBA8::new(70, 210, 60, 200)),
    ] {
        registry.push_object(BlockDefinition::decoration(name, color))?;
    }
    for (color_name, color) in GLOW_CRYSTAL_COLORS {
        registry.push_object(BlockDefinition::solid(glow_crystal_name(color_name), color))?;
    }
    Ok(())
}

/// A fresh block registry with the empty block and the base set of blocks.
pub fn basic_block_registry() -> Result<BlockRegistry, RegistryError> {
    let mut registry = new_block_registry();
    setup_basic_blocks(&mut registry)?;
    Ok(registry)
}
