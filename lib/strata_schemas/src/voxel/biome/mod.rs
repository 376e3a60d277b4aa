//! All Biome-related types

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::Rng;
use rgb::RGBA8;
use serde::{Deserialize, Serialize};

use crate::registry::{Registry, RegistryName, RegistryNameRef, RegistryObject};
use crate::voxel::generation::block_structure::BlockStructure;
use crate::voxel::generation::structure_model::StructureModel;
use crate::voxel::voxeltypes::BlockEntry;

/// A named registry of biome definitions, shared by reference with the biome maps.
pub type BiomeRegistry = Registry<Arc<BiomeDefinition>>;

/// The broad climate category of a biome.
#[derive(Copy, Clone, Hash, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum BiomeKind {
    /// Temperate, dry lowland
    #[default]
    Grassland,
    /// Temperate, medium lowland
    Forest,
    /// Hot, dry lowland
    Desert,
    /// Cold, icy lowland
    Tundra,
    /// Highland
    Mountain,
    /// Below sea level
    Ocean,
    /// Underground, selected by the cave biome distribution instead of the surface map
    Cave,
}

/// A definition of a biome type: where it may appear, how its ground is layered and what grows on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeDefinition {
    /// The unique registry name
    pub name: RegistryName,
    /// Climate category
    pub kind: BiomeKind,
    /// Lowest world height (inclusive) the biome is valid at
    pub min_height: i32,
    /// Highest world height (exclusive) the biome is valid at
    pub max_height: i32,
    /// Relative selection weight among the valid candidates
    pub chance: u32,
    /// Amplitude of small-scale height noise, in blocks
    pub roughness: f32,
    /// Amplitude of medium-scale height noise, in blocks
    pub hills: f32,
    /// Amplitude of large-scale height noise, in blocks
    pub mountains: f32,
    /// Ground layers below the surface, top to bottom
    pub structure: BlockStructure,
    /// Block filling the ground below the layers
    pub stone_block: BlockEntry,
    /// Structures scattered on the surface, the first ones are preferred
    pub vegetation_models: Vec<StructureModel>,
    /// A color that can represent the biome on maps, debug views, etc.
    pub representative_color: RGBA8,
}

impl Hash for BiomeDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
        self.min_height.hash(state);
        self.max_height.hash(state);
        self.chance.hash(state);
    }
}

impl RegistryObject for BiomeDefinition {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

impl BiomeDefinition {
    /// Checks if the biome may appear at the given world height.
    #[inline]
    pub fn valid_at(&self, y: i32) -> bool {
        self.min_height <= y && y < self.max_height
    }

    /// Checks if the biome's height window intersects `[low, high)`.
    #[inline]
    pub fn overlaps(&self, low: i32, high: i32) -> bool {
        self.min_height < high && self.max_height > low
    }

    /// Checks if the height window contains at least one height.
    #[inline]
    pub fn has_valid_heights(&self) -> bool {
        self.min_height < self.max_height
    }

    /// Checks if this is an underground biome.
    #[inline]
    pub fn is_cave(&self) -> bool {
        self.kind == BiomeKind::Cave
    }
}

/// Weighted random choice among `candidates`, stable for a given random draw and candidate order.
///
/// Draws one value in `[0, total)` and subtracts each candidate's weight in order until the value goes negative.
/// A zero total weight counts as a total of 1 and selects the first candidate.
/// Returns `None` only if there are no candidates.
pub fn pick_weighted<'c, T, R: Rng + ?Sized>(
    candidates: &'c [T],
    weight: impl Fn(&T) -> u32,
    rng: &mut R,
) -> Option<&'c T> {
    let first = candidates.first()?;
    let total: u64 = candidates.iter().map(|c| u64::from(weight(c))).sum();
    let mut value = rng.gen_range(0..total.max(1)) as i64;
    for candidate in candidates {
        value -= i64::from(weight(candidate));
        if value < 0 {
            return Some(candidate);
        }
    }
    Some(first)
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn weighted_pick_follows_weights() {
        let mut rng = Pcg64::seed_from_u64(0x5eed);
        let weights = [1u32, 3];
        let draws = 20_000;
        let second = (0..draws)
            .filter(|_| std::ptr::eq(pick_weighted(&weights, |w| *w, &mut rng).unwrap(), &weights[1]))
            .count();
        let ratio = second as f64 / draws as f64;
        assert!((ratio - 0.75).abs() < 0.02, "ratio {ratio}");
    }

    #[test]
    fn weighted_pick_zero_total_takes_first() {
        let mut rng = Pcg64::seed_from_u64(1);
        let weights = [0u32, 0];
        for _ in 0..100 {
            assert!(std::ptr::eq(pick_weighted(&weights, |w| *w, &mut rng).unwrap(), &weights[0]));
        }
        let empty: [u32; 0] = [];
        assert!(pick_weighted(&empty, |w| *w, &mut rng).is_none());
    }

    #[test]
    fn weighted_pick_is_stable_for_same_stream() {
        let weights = [5u32, 0, 2, 9];
        let mut a = Pcg64::seed_from_u64(77);
        let mut b = Pcg64::seed_from_u64(77);
        for _ in 0..256 {
            let pa = pick_weighted(&weights, |w| *w, &mut a).unwrap() as *const u32;
            let pb = pick_weighted(&weights, |w| *w, &mut b).unwrap() as *const u32;
            assert_eq!(pa, pb);
            assert_ne!(pa, &weights[1] as *const u32);
        }
    }

    #[test]
    fn height_windows() {
        let biome = BiomeDefinition {
            name: RegistryName::strata("test"),
            kind: BiomeKind::Cave,
            min_height: -100,
            max_height: 10,
            chance: 1,
            roughness: 0.0,
            hills: 0.0,
            mountains: 0.0,
            structure: BlockStructure::default(),
            stone_block: BlockEntry::EMPTY,
            vegetation_models: vec![],
            representative_color: RGBA8::new(0, 0, 0, 255),
        };
        assert!(biome.valid_at(-100));
        assert!(!biome.valid_at(10));
        assert!(biome.overlaps(9, 100));
        assert!(!biome.overlaps(10, 100));
        assert!(biome.has_valid_heights());
        assert!(biome.is_cave());
    }
}
