//! The builtin ore veins.

use smallvec::smallvec;
use strata_schemas::registry::{RegistryError, RegistryName};
use strata_schemas::voxel::ore::{OreDefinition, OreRegistry};
use strata_schemas::voxel::voxeltypes::{BlockEntry, BlockRegistry};

use super::blocks::{COAL_ORE_BLOCK_NAME, GOLD_ORE_BLOCK_NAME, IRON_ORE_BLOCK_NAME, STONE_BLOCK_NAME};

/// Registry name for coal.
pub const COAL_ORE_NAME: RegistryName = RegistryName::strata_const("coal");
/// Registry name for iron.
pub const IRON_ORE_NAME: RegistryName = RegistryName::strata_const("iron");
/// Registry name for gold.
pub const GOLD_ORE_NAME: RegistryName = RegistryName::strata_const("gold");

/// Installs the base ores, each replacing only stone.
pub fn setup_basic_ores(block_registry: &BlockRegistry, ore_registry: &mut OreRegistry) -> Result<(), RegistryError> {
    let (stone, _) = block_registry.require(STONE_BLOCK_NAME.as_ref())?;
    let ores = [
        (COAL_ORE_NAME, COAL_ORE_BLOCK_NAME, 128, 8.0, 24.0, 0.6),
        (IRON_ORE_NAME, IRON_ORE_BLOCK_NAME, 0, 3.0, 12.0, 0.5),
        (GOLD_ORE_NAME, GOLD_ORE_BLOCK_NAME, -256, 1.2, 8.0, 0.4),
    ];
    for (name, block_name, max_height, veins, size, density) in ores {
        let (block, _) = block_registry.require(block_name.as_ref())?;
        ore_registry.push_object(OreDefinition {
            name,
            block: BlockEntry::new(block, 0),
            max_height,
            veins,
            size,
            density,
            sources: smallvec![stone],
        })?;
    }
    Ok(())
}
