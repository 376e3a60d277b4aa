//! Data structures for storage and manipulation of per-voxel data.
use std::fmt::Debug;
use std::hash::Hash;

use crate::coordinates::*;

pub mod array;

/// Marker trait for all the requirements for a type to be stored as per-voxel chunk data.
/// Do not derive yourself, the blanked implementation should cover all types that are valid.
pub trait ChunkDataType: Clone + PartialEq + Hash + Debug {}

/// Blanket implementation for all valid chunk data types.
impl<T> ChunkDataType for T where T: Clone + PartialEq + Hash + Debug {}

/// A container for chunk's data, abstracted from the actual in-memory representation.
pub trait ChunkStorage<DataType: ChunkDataType> {
    /// Gets the element at the given coordinates.
    fn get(&self, position: InChunkPos) -> &DataType;
    /// Gets the element at the given coordinates, for [`Copy`] types.
    fn get_copy(&self, position: InChunkPos) -> DataType
    where
        DataType: Copy;
    /// Puts a single element at the given coordinates.
    ///
    /// Returns the old value.
    fn put(&mut self, position: InChunkPos, new_value: DataType) -> DataType;
    /// Replaces every element of the chunk with the given value.
    fn fill_all(&mut self, new_value: DataType);
    /// Iterates over all elements in XZY storage order.
    fn iter_xzy<'a>(&'a self) -> impl Iterator<Item = (InChunkPos, &'a DataType)>
    where
        DataType: 'a;
}

pub use array::ArrayStorage;
