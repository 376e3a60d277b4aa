//! Representation of chunks of voxel data at a given level of detail.
//!
//! All the coordinates taken by [`Chunk`] methods are relative to the chunk origin and measured in world blocks,
//! so a chunk of voxel size 4 accepts `x` in `{0, 4, 8, ..., 124}`.
use std::sync::Arc;

use bevy_math::IVec3;
use thiserror::Error;

use crate::coordinates::{AbsBlockPos, ChunkPosition, InChunkPos, CHUNK_DIM};
use crate::voxel::chunk_storage::{ArrayStorage, ChunkStorage};
use crate::voxel::voxeltypes::{BlockEntry, BlockRegistry};

/// Error when accessing a voxel that is not part of the chunk.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Relative position {position} is not a voxel of a chunk with voxel size {voxel_size}")]
pub struct ChunkAccessError {
    /// The rejected relative position.
    pub position: IVec3,
    /// The voxel size of the accessed chunk.
    pub voxel_size: i32,
}

/// A 32³ grid of voxels sampling one cubic region of the world at one voxel size.
#[derive(Clone)]
pub struct Chunk {
    position: ChunkPosition,
    blocks: ArrayStorage<BlockEntry>,
    block_registry: Arc<BlockRegistry>,
    was_changed: bool,
}

impl Chunk {
    /// An empty chunk, every voxel set to [`BlockEntry::EMPTY`].
    pub fn new(position: ChunkPosition, block_registry: Arc<BlockRegistry>) -> Self {
        Self {
            position,
            blocks: ArrayStorage::new(BlockEntry::EMPTY),
            block_registry,
            was_changed: false,
        }
    }

    /// Placement of the chunk in the world.
    #[inline]
    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    /// World-space origin.
    #[inline]
    pub fn origin(&self) -> AbsBlockPos {
        self.position.origin()
    }

    /// Level of detail: how many world blocks one voxel spans along each axis.
    #[inline]
    pub fn voxel_size(&self) -> i32 {
        self.position.voxel_size()
    }

    /// Width of the chunk in world blocks.
    #[inline]
    pub fn width(&self) -> i32 {
        self.position.width()
    }

    /// The block registry voxel ids refer to.
    pub fn block_registry(&self) -> &Arc<BlockRegistry> {
        &self.block_registry
    }

    /// World X coordinate of a relative X coordinate.
    #[inline]
    pub fn world_x(&self, x: i32) -> i32 {
        self.origin().x + x
    }

    /// World Y coordinate of a relative Y coordinate.
    #[inline]
    pub fn world_y(&self, y: i32) -> i32 {
        self.origin().y + y
    }

    /// World Z coordinate of a relative Z coordinate.
    #[inline]
    pub fn world_z(&self, z: i32) -> i32 {
        self.origin().z + z
    }

    /// Checks if the relative coordinates address one voxel of this chunk:
    /// each one in `[0, width)` and a multiple of the voxel size.
    #[inline]
    pub fn lies_in_chunk(&self, x: i32, y: i32, z: i32) -> bool {
        let width = self.width();
        let mask = self.voxel_size() - 1;
        (x | y | z) & mask == 0 && x >= 0 && x < width && y >= 0 && y < width && z >= 0 && z < width
    }

    /// Rounds a relative coordinate up to the next multiple of the voxel size.
    #[inline]
    pub fn start_index(&self, start: i32) -> i32 {
        let vs = self.voxel_size();
        (start + vs - 1) & !(vs - 1)
    }

    fn voxel_pos(&self, x: i32, y: i32, z: i32) -> Result<InChunkPos, ChunkAccessError> {
        if !self.lies_in_chunk(x, y, z) {
            return Err(ChunkAccessError {
                position: IVec3::new(x, y, z),
                voxel_size: self.voxel_size(),
            });
        }
        let shift = self.position.voxel_shift();
        InChunkPos::try_new(x >> shift, y >> shift, z >> shift).map_err(|_| ChunkAccessError {
            position: IVec3::new(x, y, z),
            voxel_size: self.voxel_size(),
        })
    }

    /// Reads one voxel.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<BlockEntry, ChunkAccessError> {
        Ok(self.blocks.get_copy(self.voxel_pos(x, y, z)?))
    }

    /// Checks if lower-priority generation stages may overwrite the given block.
    pub fn is_degradable(&self, entry: BlockEntry) -> bool {
        entry.is_empty() || entry.lookup(&self.block_registry).is_some_and(|def| def.degradable)
    }

    /// Overwrites one voxel as an edit after generation, marking the chunk as changed.
    pub fn update_block(&mut self, x: i32, y: i32, z: i32, entry: BlockEntry) -> Result<(), ChunkAccessError> {
        let pos = self.voxel_pos(x, y, z)?;
        self.blocks.put(pos, entry);
        self.was_changed = true;
        Ok(())
    }

    /// Overwrites one voxel during generation.
    pub fn update_block_in_generation(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        entry: BlockEntry,
    ) -> Result<(), ChunkAccessError> {
        let pos = self.voxel_pos(x, y, z)?;
        self.blocks.put(pos, entry);
        Ok(())
    }

    /// Overwrites one voxel during generation unless the voxel already holds a non-degradable block.
    ///
    /// Returns whether the voxel was written.
    pub fn update_block_if_degradable(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        entry: BlockEntry,
    ) -> Result<bool, ChunkAccessError> {
        let pos = self.voxel_pos(x, y, z)?;
        let old = self.blocks.get_copy(pos);
        if !self.is_degradable(old) {
            return Ok(false);
        }
        self.blocks.put(pos, entry);
        Ok(true)
    }

    /// If the chunk was edited with [`Self::update_block`] since it was generated.
    pub fn was_changed(&self) -> bool {
        self.was_changed
    }

    /// Iterates over all voxels as `(x, y, z, block)` in relative world-block coordinates.
    pub fn iter_voxels(&self) -> impl Iterator<Item = (i32, i32, i32, BlockEntry)> + '_ {
        let vs = self.voxel_size();
        self.blocks
            .iter_xzy()
            .map(move |(pos, &entry)| (pos.x * vs, pos.y * vs, pos.z * vs, entry))
    }

    /// Counts the voxels holding exactly the given block.
    pub fn count_blocks(&self, entry: BlockEntry) -> usize {
        match &self.blocks {
            ArrayStorage::Singleton(e) if *e == entry => (CHUNK_DIM * CHUNK_DIM * CHUNK_DIM) as usize,
            ArrayStorage::Singleton(_) => 0,
            ArrayStorage::Array(arr) => arr.iter().filter(|&&e| e == entry).count(),
        }
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.blocks == other.blocks
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("position", &self.position)
            .field("singleton", &self.blocks.is_singleton())
            .field("was_changed", &self.was_changed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;
    use rgb::RGBA8;

    use super::*;
    use crate::registry::RegistryName;
    use crate::voxel::voxeltypes::{new_block_registry, BlockDefinition};

    fn test_chunk(voxel_size: i32) -> (Chunk, BlockEntry, BlockEntry) {
        let mut registry = new_block_registry();
        let stone = registry
            .push_object(BlockDefinition::solid(RegistryName::strata("stone"), RGBA8::new(1, 1, 1, 255)))
            .unwrap();
        let leaves = registry
            .push_object(BlockDefinition::decoration(
                RegistryName::strata("leaves"),
                RGBA8::new(0, 255, 0, 255),
            ))
            .unwrap();
        let position = ChunkPosition::new(AbsBlockPos::ZERO, voxel_size).unwrap();
        (
            Chunk::new(position, Arc::new(registry)),
            BlockEntry::new(stone, 0),
            BlockEntry::new(leaves, 0),
        )
    }

    #[test]
    fn writes_respect_bounds_and_lattice() {
        let (mut chunk, stone, _) = test_chunk(2);
        assert!(chunk.update_block_in_generation(0, 0, 0, stone).is_ok());
        assert!(chunk.update_block_in_generation(62, 62, 62, stone).is_ok());
        assert!(chunk.update_block_in_generation(64, 0, 0, stone).is_err());
        assert!(chunk.update_block_in_generation(-2, 0, 0, stone).is_err());
        assert!(chunk.update_block_in_generation(1, 0, 0, stone).is_err());
        assert_eq!(chunk.get_block(62, 62, 62), Ok(stone));
        assert_eq!(chunk.count_blocks(stone), 2);
        assert!(!chunk.was_changed());
        chunk.update_block(2, 2, 2, stone).unwrap();
        assert!(chunk.was_changed());
    }

    #[test]
    fn start_index_rounds_up_to_lattice() {
        let (chunk, _, _) = test_chunk(4);
        assert_eq!(chunk.start_index(0), 0);
        assert_eq!(chunk.start_index(1), 4);
        assert_eq!(chunk.start_index(4), 4);
        assert_eq!(chunk.start_index(-1), 0);
        assert_eq!(chunk.start_index(-5), -4);
    }

    #[test]
    fn non_degradable_voxels_survive_decoration() {
        let (mut chunk, stone, leaves) = test_chunk(1);
        chunk.update_block_in_generation(5, 5, 5, stone).unwrap();
        assert_eq!(chunk.update_block_if_degradable(5, 5, 5, leaves), Ok(false));
        assert_eq!(chunk.get_block(5, 5, 5), Ok(stone));
        assert_eq!(chunk.update_block_if_degradable(5, 6, 5, leaves), Ok(true));
        assert_eq!(chunk.update_block_if_degradable(5, 6, 5, stone), Ok(true));
        assert_eq!(chunk.update_block_if_degradable(5, 6, 5, leaves), Ok(false));
    }

    #[test]
    fn world_coordinates_follow_origin() {
        let mut registry = new_block_registry();
        registry
            .push_object(BlockDefinition::solid(RegistryName::strata("stone"), RGBA8::new(1, 1, 1, 255)))
            .unwrap();
        let position = ChunkPosition::new(AbsBlockPos::new(-64, 128, 64), 2).unwrap();
        let chunk = Chunk::new(position, Arc::new(registry));
        assert_eq!(chunk.world_x(2), -62);
        assert_eq!(chunk.world_y(0), 128);
        assert_eq!(chunk.world_z(62), 126);
        let (x, y, z, _) = chunk.iter_voxels().last().unwrap();
        assert_eq!((x, y, z), (62, 62, 62));
    }

    #[quickcheck]
    fn lies_in_chunk_rejects_outside_and_off_lattice(x: i32, y: i32, z: i32, shift: u8) -> bool {
        let (chunk, _, _) = test_chunk(1 << (shift % 6));
        let vs = chunk.voxel_size();
        let expected = [x, y, z].iter().all(|&c| c >= 0 && c < chunk.width() && c % vs == 0);
        chunk.lies_in_chunk(x, y, z) == expected && chunk.get_block(x, y, z).is_ok() == expected
    }

    #[quickcheck]
    fn start_index_is_lattice_point_not_below_start(start: i16, shift: u8) -> bool {
        let (chunk, _, _) = test_chunk(1 << (shift % 6));
        let vs = chunk.voxel_size();
        let start = start as i32;
        let idx = chunk.start_index(start);
        idx >= start && idx - start < vs && idx.rem_euclid(vs) == 0
    }
}
