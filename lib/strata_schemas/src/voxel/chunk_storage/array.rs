//! Array-backed storage

use std::iter::repeat;

use crate::coordinates::{InChunkPos, CHUNK_DIM3Z};
use crate::voxel::chunk_storage::{ChunkDataType, ChunkStorage};

/// Simple XZY dense array storage for chunk data (with strides of X=1, Z=32, Y=32²).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArrayStorage<T: ChunkDataType> {
    /// Single-element case for cases where every single chunk element is identical
    Singleton(T),
    /// Case where at least one element in a chunk is different
    Array(Box<[T; CHUNK_DIM3Z]>),
}

impl<T: ChunkDataType + Default> Default for ArrayStorage<T> {
    fn default() -> Self {
        Self::Singleton(T::default())
    }
}

impl<T: ChunkDataType> ArrayStorage<T> {
    /// Storage where every element is the given value.
    pub fn new(fill: T) -> Self {
        Self::Singleton(fill)
    }

    /// Checks if the storage still holds a single repeated value.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton(_))
    }

    #[cold]
    fn upgrade(&mut self) -> &mut [T; CHUNK_DIM3Z] {
        if let Self::Singleton(e) = self {
            let new_arr: Vec<T> = repeat(e.clone()).take(CHUNK_DIM3Z).collect();
            match new_arr.into_boxed_slice().try_into() {
                Ok(arr) => *self = Self::Array(arr),
                Err(_) => unreachable!("the vector has exactly CHUNK_DIM3Z elements"),
            }
        }
        match self {
            Self::Array(arr) => arr,
            Self::Singleton(_) => unreachable!(),
        }
    }
}

impl<T: ChunkDataType> ChunkStorage<T> for ArrayStorage<T> {
    fn get(&self, position: InChunkPos) -> &T {
        match self {
            Self::Singleton(e) => e,
            Self::Array(arr) => &arr[position.as_index()],
        }
    }

    fn get_copy(&self, position: InChunkPos) -> T
    where
        T: Copy,
    {
        match self {
            Self::Singleton(e) => *e,
            Self::Array(arr) => arr[position.as_index()],
        }
    }

    fn put(&mut self, position: InChunkPos, new_value: T) -> T {
        if let Self::Singleton(e) = self {
            if *e == new_value {
                return new_value;
            }
        }
        std::mem::replace(&mut self.upgrade()[position.as_index()], new_value)
    }

    fn fill_all(&mut self, new_value: T) {
        *self = Self::Singleton(new_value);
    }

    fn iter_xzy<'a>(&'a self) -> impl Iterator<Item = (InChunkPos, &'a T)>
    where
        T: 'a,
    {
        (0..CHUNK_DIM3Z).filter_map(move |i| {
            let pos = InChunkPos::try_from_index(i).ok()?;
            Some((pos, self.get(pos)))
        })
    }
}
