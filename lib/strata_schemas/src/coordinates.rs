//! Strongly typed newtype wrappers for the coordinate formats used by the world generator, and related constants.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use bevy_math::IVec3;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base-2 logarithm of [`CHUNK_DIM`]
pub const CHUNK_SHIFT: i32 = 5;
/// Length of a side of a chunk in voxels, independent of the voxel size
pub const CHUNK_DIM: i32 = 1 << CHUNK_SHIFT;
/// Length of a side of a chunk in voxels
pub const CHUNK_DIMZ: usize = CHUNK_DIM as usize;
/// Number of voxels on the face of a chunk
pub const CHUNK_DIM2: i32 = CHUNK_DIM * CHUNK_DIM;
/// Number of voxels on the face of a chunk
pub const CHUNK_DIM2Z: usize = (CHUNK_DIM * CHUNK_DIM) as usize;
/// Number of voxels in the volume of the chunk
pub const CHUNK_DIM3Z: usize = (CHUNK_DIM * CHUNK_DIM * CHUNK_DIM) as usize;
/// The coarsest level of detail, as a voxel size in blocks.
pub const MAX_VOXEL_SIZE: i32 = 32;
/// Maximum block position allowed, +-2^30 or 1 billion blocks to have a safe margin to avoid integer overflows.
pub const MAX_BLOCK_POS: i32 = 1 << 30;

static_assertions::const_assert!((MAX_VOXEL_SIZE as u32).is_power_of_two());
static_assertions::const_assert_eq!(CHUNK_DIM3Z, 32 * 32 * 32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Given coordinates were outside of chunk boundaries: {0}")]
/// Error when the given coordinates are outside of the chunk boundary.
pub struct InChunkVecError(IVec3);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Given index was outside of chunk boundaries: {0}")]
/// Error when the given voxel index is outside of the chunk boundary.
pub struct InChunkIndexError(usize);

/// Errors from validating a [`ChunkPosition`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ChunkPositionError {
    /// Voxel sizes are powers of two between 1 and [`MAX_VOXEL_SIZE`].
    #[error("Voxel size {0} is not a power of two in 1..={MAX_VOXEL_SIZE}")]
    InvalidVoxelSize(i32),
    /// The origin must be a multiple of the chunk's width in blocks.
    #[error("Chunk origin {origin} is not aligned to the chunk width {width}")]
    UnalignedOrigin {
        /// The rejected origin.
        origin: IVec3,
        /// The chunk width in blocks at the requested voxel size.
        width: i32,
    },
    /// The origin is too far away from the world center.
    #[error("Chunk origin {0} exceeds the world bounds")]
    OutOfWorld(IVec3),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// A voxel index position inside of a chunk, limited to 0..[CHUNK_DIM] on every axis
pub struct InChunkPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute chunk grid position, counted in chunk widths of some voxel size
pub struct AbsChunkPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute block position in a voxel world
pub struct AbsBlockPos(pub(crate) IVec3);

// === Utils
macro_rules! impl_simple_ivec3_newtype {
    ($T:ident) => {
        impl $T {
            /// (0, 0, 0)
            pub const ZERO: Self = Self(IVec3::ZERO);
            /// (1, 1, 1)
            pub const ONE: Self = Self(IVec3::ONE);

            /// Const-friendly `from<IVec3>`
            #[inline]
            pub const fn from_ivec3(value: IVec3) -> Self {
                Self(value)
            }

            /// Const-friendly `into<IVec3>`
            #[inline]
            pub const fn into_ivec3(self) -> IVec3 {
                self.0
            }

            /// Constructs a new [`Self`] from the given coordinates.
            #[inline]
            pub const fn new(x: i32, y: i32, z: i32) -> Self {
                Self(IVec3::new(x, y, z))
            }

            /// Constructs a new [`Self`] from a given coordinate copied to all dimensions.
            #[inline]
            pub const fn splat(v: i32) -> Self {
                Self(IVec3::splat(v))
            }
        }

        impl From<IVec3> for $T {
            #[inline]
            fn from(value: IVec3) -> Self {
                Self::from_ivec3(value)
            }
        }
        impl From<$T> for IVec3 {
            #[inline]
            fn from(value: $T) -> IVec3 {
                value.into_ivec3()
            }
        }
        impl std::ops::Deref for $T {
            type Target = IVec3;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

// === InChunkPos

impl TryFrom<IVec3> for InChunkPos {
    type Error = InChunkVecError;

    #[inline]
    fn try_from(value: IVec3) -> Result<Self, Self::Error> {
        Self::try_from_ivec3(value)
    }
}

impl From<InChunkPos> for IVec3 {
    #[inline]
    fn from(value: InChunkPos) -> IVec3 {
        value.0
    }
}

impl Deref for InChunkPos {
    type Target = IVec3;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl InChunkPos {
    /// (0, 0, 0)
    pub const ZERO: Self = Self(IVec3::ZERO);
    /// (31, 31, 31)
    pub const MAX: Self = Self(IVec3::splat(CHUNK_DIM - 1));

    /// Const-friendly `try_from<IVec3>`
    #[inline]
    pub const fn try_from_ivec3(v: IVec3) -> Result<Self, InChunkVecError> {
        let IVec3 { x, y, z } = v;
        if (x < 0) || (x >= CHUNK_DIM) || (y < 0) || (y >= CHUNK_DIM) || (z < 0) || (z >= CHUNK_DIM) {
            Err(InChunkVecError(v))
        } else {
            Ok(Self(v))
        }
    }

    /// Constructs a new in-chunk position from the given voxel indices, or returns an error if it's
    /// outside of chunk bounds.
    #[inline]
    pub const fn try_new(x: i32, y: i32, z: i32) -> Result<Self, InChunkVecError> {
        Self::try_from_ivec3(IVec3::new(x, y, z))
    }

    /// Convert a XZY-strided index into a chunk storage array into the coordinates
    #[inline]
    pub const fn try_from_index(idx: usize) -> Result<Self, InChunkIndexError> {
        if idx >= CHUNK_DIM3Z {
            return Err(InChunkIndexError(idx));
        }
        let i: i32 = idx as i32;
        Ok(InChunkPos(IVec3::new(
            i % CHUNK_DIM,
            (i / CHUNK_DIM2) % CHUNK_DIM,
            (i / CHUNK_DIM) % CHUNK_DIM,
        )))
    }

    /// Converts the coordinates into an XZY-strided index into the chunk storage array
    #[inline]
    pub const fn as_index(self) -> usize {
        (self.0.x + (CHUNK_DIM * self.0.z) + (CHUNK_DIM2 * self.0.y)) as usize
    }

    /// Iterates over every position of a chunk in storage (XZY) order.
    pub fn iter_all() -> impl Iterator<Item = InChunkPos> {
        itertools::iproduct!(0..CHUNK_DIM, 0..CHUNK_DIM, 0..CHUNK_DIM).map(|(y, z, x)| InChunkPos(IVec3::new(x, y, z)))
    }
}

// === AbsChunkPos
impl_simple_ivec3_newtype!(AbsChunkPos);

impl Display for AbsChunkPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chunk(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

// === AbsBlockPos
impl_simple_ivec3_newtype!(AbsBlockPos);

impl AbsBlockPos {
    /// Rounds every coordinate down to a multiple of the given power-of-two step.
    #[inline]
    pub fn align_down(self, step: i32) -> Self {
        debug_assert!(step > 0 && (step & (step - 1)) == 0);
        Self(self.0 & IVec3::splat(!(step - 1)))
    }
}

impl Display for AbsBlockPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

/// The placement of one chunk in the world: its origin block and the voxel size it samples the world at.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct ChunkPosition {
    origin: AbsBlockPos,
    voxel_size: i32,
}

impl ChunkPosition {
    /// Validates and constructs a chunk position from its world-space origin.
    pub fn new(origin: AbsBlockPos, voxel_size: i32) -> Result<Self, ChunkPositionError> {
        if voxel_size <= 0 || voxel_size > MAX_VOXEL_SIZE || (voxel_size & (voxel_size - 1)) != 0 {
            return Err(ChunkPositionError::InvalidVoxelSize(voxel_size));
        }
        if origin.to_array().iter().any(|c| c.unsigned_abs() > MAX_BLOCK_POS as u32) {
            return Err(ChunkPositionError::OutOfWorld(origin.0));
        }
        let width = CHUNK_DIM * voxel_size;
        if origin.align_down(width) != origin {
            return Err(ChunkPositionError::UnalignedOrigin {
                origin: origin.0,
                width,
            });
        }
        Ok(Self { origin, voxel_size })
    }

    /// Constructs the position of the chunk with the given grid coordinates at the given voxel size.
    pub fn from_chunk_pos(pos: AbsChunkPos, voxel_size: i32) -> Result<Self, ChunkPositionError> {
        let width = CHUNK_DIM.saturating_mul(voxel_size.max(1));
        let [x, y, z] = pos.to_array().map(|c| c.saturating_mul(width));
        Self::new(AbsBlockPos::new(x, y, z), voxel_size)
    }

    /// World-space origin of the chunk.
    #[inline]
    pub fn origin(self) -> AbsBlockPos {
        self.origin
    }

    /// The voxel size (level of detail) of the chunk.
    #[inline]
    pub fn voxel_size(self) -> i32 {
        self.voxel_size
    }

    /// Base-2 logarithm of the voxel size.
    #[inline]
    pub fn voxel_shift(self) -> u32 {
        self.voxel_size.trailing_zeros()
    }

    /// Width of the chunk in world blocks.
    #[inline]
    pub fn width(self) -> i32 {
        CHUNK_DIM * self.voxel_size
    }

    /// Grid coordinates of the chunk at its own voxel size.
    pub fn chunk_pos(self) -> AbsChunkPos {
        AbsChunkPos(self.origin.0 >> IVec3::splat(CHUNK_SHIFT + self.voxel_shift() as i32))
    }

    /// Checks if the world block lies inside the volume covered by this chunk.
    pub fn contains_world(self, pos: AbsBlockPos) -> bool {
        let rel = pos.0 - self.origin.0;
        rel.min_element() >= 0 && rel.max_element() < self.width()
    }
}

impl Display for ChunkPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunk(x={}, y={}, z={}, voxel_size={})",
            self.origin.x, self.origin.y, self.origin.z, self.voxel_size
        )
    }
}
