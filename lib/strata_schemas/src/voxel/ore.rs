//! Ore vein descriptions.
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::registry::{Registry, RegistryId, RegistryName, RegistryNameRef, RegistryObject};
use crate::voxel::voxeltypes::BlockEntry;

/// A named registry of ore definitions.
pub type OreRegistry = Registry<OreDefinition>;

/// How and where veins of one ore are generated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OreDefinition {
    /// The unique registry name
    pub name: RegistryName,
    /// The ore block placed in veins
    pub block: BlockEntry,
    /// Veins only start below this world height
    pub max_height: i32,
    /// Average number of veins per 32³ block region, the fractional part is a probability
    pub veins: f32,
    /// Average vein volume in blocks
    pub size: f32,
    /// Fraction of the vein volume that is filled with ore, in `(0, 1]`
    pub density: f32,
    /// Blocks a vein may replace
    pub sources: SmallVec<[RegistryId; 4]>,
}

impl Hash for OreDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.block.hash(state);
        self.max_height.hash(state);
        self.sources.hash(state);
    }
}

impl RegistryObject for OreDefinition {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

impl OreDefinition {
    /// Checks if a vein of this ore may replace the given block.
    pub fn can_create_vein_in(&self, entry: BlockEntry) -> bool {
        self.sources.contains(&entry.id)
    }

    /// Seed salt distinguishing the veins of different ores in the same region.
    pub fn seed_salt(&self) -> u64 {
        (self.max_height as u32 as u64)
            ^ (u64::from(self.size.to_bits()) << 32)
            ^ u64::from(self.block.id.0.get()).rotate_left(17)
    }
}

#[cfg(test)]
mod test {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn sources_limit_replacement() {
        let stone = RegistryId::try_from(2).unwrap();
        let ore = OreDefinition {
            name: RegistryName::strata("coal"),
            block: BlockEntry::new(RegistryId::try_from(3).unwrap(), 0),
            max_height: 64,
            veins: 1.5,
            size: 16.0,
            density: 0.6,
            sources: smallvec![stone],
        };
        assert!(ore.can_create_vein_in(BlockEntry::new(stone, 0)));
        assert!(!ore.can_create_vein_in(BlockEntry::EMPTY));
        let mut other = ore.clone();
        other.size = 8.0;
        assert_ne!(ore.seed_salt(), other.seed_salt());
    }
}
