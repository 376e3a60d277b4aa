//! The set of registries a world is generated with.
use std::sync::Arc;

use crate::registry::{RegistryError, RegistryName};
use crate::voxel::biome::BiomeRegistry;
use crate::voxel::ore::OreRegistry;
use crate::voxel::voxeltypes::{BlockEntry, BlockRegistry};

/// Read-only registries built once at world load and shared by every generation call.
#[derive(Clone, Default)]
pub struct WorldRegistries {
    /// Block types
    pub blocks: Arc<BlockRegistry>,
    /// Surface and cave biomes
    pub biomes: Arc<BiomeRegistry>,
    /// Ore veins
    pub ores: Arc<OreRegistry>,
}

impl WorldRegistries {
    /// Bundles the registries.
    pub fn new(blocks: BlockRegistry, biomes: BiomeRegistry, ores: OreRegistry) -> Self {
        Self {
            blocks: Arc::new(blocks),
            biomes: Arc::new(biomes),
            ores: Arc::new(ores),
        }
    }

    /// Looks up a block by name, with no metadata.
    pub fn block(&self, name: &RegistryName) -> Result<BlockEntry, RegistryError> {
        let (id, _) = self.blocks.require(name.as_ref())?;
        Ok(BlockEntry::new(id, 0))
    }

    /// Looks up a block by `ns:key` (or bare `key` in the default namespace), with no metadata.
    pub fn block_entry(&self, name: &str) -> Result<BlockEntry, RegistryError> {
        self.block(&RegistryName::parse(name))
    }
}

impl std::fmt::Debug for WorldRegistries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldRegistries")
            .field("blocks", &self.blocks.len())
            .field("biomes", &self.biomes.len())
            .field("ores", &self.ores.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use rgb::RGBA8;

    use super::*;
    use crate::voxel::voxeltypes::{new_block_registry, BlockDefinition};

    #[test]
    fn block_entries_by_name() {
        let mut blocks = new_block_registry();
        let stone = blocks
            .push_object(BlockDefinition::solid(RegistryName::strata("stone"), RGBA8::new(1, 1, 1, 255)))
            .unwrap();
        let registries = WorldRegistries::new(blocks, Default::default(), Default::default());
        assert_eq!(registries.block_entry("strata:stone"), Ok(BlockEntry::new(stone, 0)));
        assert_eq!(registries.block_entry("empty"), Ok(BlockEntry::EMPTY));
        assert!(matches!(
            registries.block_entry("strata:lava"),
            Err(RegistryError::UnknownName { .. })
        ));
    }
}
