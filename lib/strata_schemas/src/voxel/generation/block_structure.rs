//! Vertical ground layering of a biome.

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::registry::{RegistryName, RegistryNameRef};
use crate::voxel::chunk::{Chunk, ChunkAccessError};
use crate::voxel::voxeltypes::{BlockEntry, BlockRegistry};

/// One layer of a [`BlockStructure`]: a block repeated a random number of voxels in `min..=max`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockLayer {
    /// The block the layer is made of
    pub block: BlockEntry,
    /// Minimum number of voxels
    pub min: u32,
    /// Maximum number of voxels
    pub max: u32,
}

/// Errors from parsing layer descriptions.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BlockStructureError {
    /// The description is not one of `block`, `N block`, `N to M block`.
    #[error("Malformed block layer description `{0}`")]
    Malformed(String),
    /// The block named by a layer is not registered.
    #[error("Unknown block {0} in block layer description")]
    UnknownBlock(RegistryName),
    /// The minimum run length is larger than the maximum.
    #[error("Block layer `{0}` has a minimum larger than its maximum")]
    InvertedRange(String),
}

impl std::fmt::Display for BlockLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {} of block {}", self.min, self.max, self.block.id)
    }
}

/// The ground structure of a biome from top to bottom.
///
/// Every layer has `min <= max`, whichever way the structure was built.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<BlockLayer>", into = "Vec<BlockLayer>")]
pub struct BlockStructure {
    layers: SmallVec<[BlockLayer; 4]>,
}

impl TryFrom<Vec<BlockLayer>> for BlockStructure {
    type Error = BlockStructureError;

    fn try_from(layers: Vec<BlockLayer>) -> Result<Self, Self::Error> {
        Self::new(layers)
    }
}

impl From<BlockStructure> for Vec<BlockLayer> {
    fn from(structure: BlockStructure) -> Self {
        structure.layers.into_vec()
    }
}

impl BlockStructure {
    /// Creates a structure from layers ordered top to bottom.
    pub fn new(layers: impl IntoIterator<Item = BlockLayer>) -> Result<Self, BlockStructureError> {
        let layers: SmallVec<[BlockLayer; 4]> = layers.into_iter().collect();
        if let Some(inverted) = layers.iter().find(|layer| layer.min > layer.max) {
            return Err(BlockStructureError::InvertedRange(inverted.to_string()));
        }
        Ok(Self { layers })
    }

    /// Parses layer descriptions of the form `block`, `N block` or `N to M block`, top to bottom.
    pub fn parse<'s>(
        descriptions: impl IntoIterator<Item = &'s str>,
        blocks: &BlockRegistry,
    ) -> Result<Self, BlockStructureError> {
        let mut layers = SmallVec::new();
        for description in descriptions {
            let parts: SmallVec<[&str; 4]> = description.split_whitespace().collect();
            let malformed = || BlockStructureError::Malformed(description.to_owned());
            let parse_count = |s: &str| s.parse::<u32>().map_err(|_| malformed());
            let (min, max, block_name) = match parts.as_slice() {
                [block] => (1, 1, *block),
                [count, block] => {
                    let count = parse_count(*count)?;
                    (count, count, *block)
                }
                [min, to, max, block] if to.eq_ignore_ascii_case("to") => {
                    (parse_count(*min)?, parse_count(*max)?, *block)
                }
                _ => return Err(malformed()),
            };
            if min > max {
                return Err(BlockStructureError::InvertedRange(description.to_owned()));
            }
            let name = RegistryName::parse(block_name);
            let (id, _) = blocks
                .lookup_name_to_object(RegistryNameRef::from(&name))
                .ok_or(BlockStructureError::UnknownBlock(name.clone()))?;
            layers.push(BlockLayer {
                block: BlockEntry::new(id, 0),
                min,
                max,
            });
        }
        Ok(Self { layers })
    }

    /// The layers, top to bottom.
    pub fn layers(&self) -> &[BlockLayer] {
        &self.layers
    }

    /// Places the layers into one column of the chunk, starting at relative height `depth` and going down one voxel
    /// per placed block. Only voxels inside the chunk are written, but the cursor always advances, so every chunk the
    /// column passes through consumes the same depth for the same random stream.
    ///
    /// Returns the next unfilled depth: `depth` minus the consumed voxels times the voxel size, or `depth` unchanged
    /// if all layers rolled an empty run. Stops early once the cursor reaches `min_depth`.
    pub fn add_sub_terranian<R: Rng + ?Sized>(
        &self,
        chunk: &mut Chunk,
        depth: i32,
        min_depth: i32,
        x: i32,
        z: i32,
        rng: &mut R,
    ) -> Result<i32, ChunkAccessError> {
        let vs = chunk.voxel_size();
        let mut depth = depth;
        for (layer_index, layer) in self.layers.iter().enumerate() {
            let total = layer.min + rng.gen_range(0..=layer.max - layer.min);
            for j in 0..total {
                if chunk.lies_in_chunk(x, depth, z) {
                    let mut entry = layer.block;
                    if layer_index == 0 && j == 0 {
                        let stackable = entry
                            .lookup(chunk.block_registry())
                            .is_some_and(|def| def.stackable);
                        if stackable {
                            let thickness = (total as i64 * vs as i64).min(u8::MAX as i64);
                            entry = entry.with_metadata(thickness as u8);
                        }
                    }
                    chunk.update_block_in_generation(x, depth, z, entry)?;
                }
                depth -= vs;
                if depth <= min_depth {
                    return Ok(depth);
                }
            }
        }
        Ok(depth)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use rgb::RGBA8;

    use super::*;
    use crate::coordinates::{AbsBlockPos, ChunkPosition};
    use crate::voxel::voxeltypes::{new_block_registry, BlockDefinition};

    fn registry() -> (BlockRegistry, BlockEntry, BlockEntry) {
        let mut registry = new_block_registry();
        let a = registry
            .push_object(BlockDefinition::solid(RegistryName::strata("grass"), RGBA8::new(0, 200, 0, 255)).stackable())
            .unwrap();
        let b = registry
            .push_object(BlockDefinition::solid(RegistryName::strata("soil"), RGBA8::new(120, 80, 0, 255)))
            .unwrap();
        (registry, BlockEntry::new(a, 0), BlockEntry::new(b, 0))
    }

    #[test]
    fn layer_depth_is_conserved() {
        let (registry, a, b) = registry();
        let structure = BlockStructure::new([
            BlockLayer { block: a, min: 2, max: 2 },
            BlockLayer { block: b, min: 3, max: 3 },
        ])
        .unwrap();
        let mut chunk = Chunk::new(
            ChunkPosition::new(AbsBlockPos::ZERO, 1).unwrap(),
            Arc::new(registry),
        );
        let mut rng = Pcg64::seed_from_u64(3);
        let d = 20;
        assert_eq!(structure.add_sub_terranian(&mut chunk, d, -1, 4, 6, &mut rng), Ok(d - 5));
        assert_eq!(chunk.get_block(4, 20, 6).unwrap(), a.with_metadata(2));
        assert_eq!(chunk.get_block(4, 19, 6).unwrap(), a);
        for y in 16..=18 {
            assert_eq!(chunk.get_block(4, y, 6).unwrap(), b);
        }
        assert_eq!(chunk.get_block(4, 15, 6).unwrap(), BlockEntry::EMPTY);
        assert_eq!(chunk.count_blocks(a) + chunk.count_blocks(a.with_metadata(2)), 2);
        assert_eq!(chunk.count_blocks(b), 3);
    }

    #[test]
    fn empty_structure_keeps_cursor() {
        let (registry, a, _) = registry();
        let mut chunk = Chunk::new(
            ChunkPosition::new(AbsBlockPos::ZERO, 2).unwrap(),
            Arc::new(registry),
        );
        let mut rng = Pcg64::seed_from_u64(3);
        let zero = BlockStructure::new([BlockLayer { block: a, min: 0, max: 0 }]).unwrap();
        assert_eq!(zero.add_sub_terranian(&mut chunk, 10, -2, 0, 0, &mut rng), Ok(10));
        assert_eq!(chunk.count_blocks(BlockEntry::EMPTY), 32 * 32 * 32);
    }

    #[test]
    fn cursor_advances_above_the_chunk() {
        let (registry, a, b) = registry();
        let structure = BlockStructure::new([
            BlockLayer { block: a, min: 4, max: 4 },
            BlockLayer { block: b, min: 4, max: 4 },
        ])
        .unwrap();
        let mut chunk = Chunk::new(
            ChunkPosition::new(AbsBlockPos::ZERO, 1).unwrap(),
            Arc::new(registry),
        );
        let mut rng = Pcg64::seed_from_u64(9);
        // Starts 2 voxels above the chunk top, so only 6 voxels land in it.
        assert_eq!(structure.add_sub_terranian(&mut chunk, 33, -1, 0, 0, &mut rng), Ok(25));
        assert_eq!(chunk.count_blocks(a), 2);
        assert_eq!(chunk.count_blocks(b), 4);
    }

    #[test]
    fn stops_at_min_depth() {
        let (registry, a, _) = registry();
        let structure = BlockStructure::new([BlockLayer { block: a, min: 10, max: 10 }]).unwrap();
        let mut chunk = Chunk::new(
            ChunkPosition::new(AbsBlockPos::ZERO, 1).unwrap(),
            Arc::new(registry),
        );
        let mut rng = Pcg64::seed_from_u64(9);
        assert_eq!(structure.add_sub_terranian(&mut chunk, 3, -1, 0, 0, &mut rng), Ok(-1));
    }

    #[test]
    fn inverted_layers_are_rejected() {
        let (registry, a, b) = registry();
        let inverted = [
            BlockLayer { block: a, min: 1, max: 1 },
            BlockLayer { block: b, min: 3, max: 1 },
        ];
        assert!(matches!(
            BlockStructure::new(inverted),
            Err(BlockStructureError::InvertedRange(_))
        ));
        // Deserialization goes through the same check.
        assert!(BlockStructure::try_from(inverted.to_vec()).is_err());

        let valid = BlockStructure::try_from(vec![BlockLayer { block: b, min: 0, max: 3 }]).unwrap();
        let mut chunk = Chunk::new(
            ChunkPosition::new(AbsBlockPos::ZERO, 1).unwrap(),
            Arc::new(registry),
        );
        for seed in 0..16 {
            let mut rng = Pcg64::seed_from_u64(seed);
            let depth = valid.add_sub_terranian(&mut chunk, 20, -1, 1, 1, &mut rng).unwrap();
            assert!((17..=20).contains(&depth), "{depth}");
        }
    }

    #[test]
    fn parse_layer_descriptions() {
        let (registry, a, b) = registry();
        let structure = BlockStructure::parse(["strata:grass", "2 to 3 strata:soil", "4 soil"], &registry).unwrap();
        assert_eq!(
            structure.layers(),
            &[
                BlockLayer { block: a, min: 1, max: 1 },
                BlockLayer { block: b, min: 2, max: 3 },
                BlockLayer { block: b, min: 4, max: 4 },
            ]
        );
        assert!(matches!(
            BlockStructure::parse(["2 to strata:soil"], &registry),
            Err(BlockStructureError::Malformed(_))
        ));
        assert!(matches!(
            BlockStructure::parse(["3 to 2 strata:soil"], &registry),
            Err(BlockStructureError::InvertedRange(_))
        ));
        assert!(matches!(
            BlockStructure::parse(["strata:lava"], &registry),
            Err(BlockStructureError::UnknownBlock(_))
        ));
    }
}
