//! Descriptors for voxel/block types.
use std::fmt::{Debug, Formatter};

use rgb::RGBA8;
use serde::{Deserialize, Serialize};

use crate::registry::{Registry, RegistryId, RegistryName, RegistryNameRef, RegistryObject};

/// The auxiliary per-voxel data byte (orientation, substance variant, recorded layer depth).
pub type BlockMetadata = u8;

/// A Block type reference (id + metadata) stored in a chunk, used to uniquely identify a registered block variant.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct BlockEntry {
    /// The block ID in the registry
    pub id: RegistryId,
    /// Metadata, the auxiliary "data" byte of the voxel
    pub metadata: BlockMetadata,
}

/// A named registry of block definitions.
pub type BlockRegistry = Registry<BlockDefinition>;

impl BlockEntry {
    /// The unset/air voxel, the first block registered in every [`BlockRegistry`].
    pub const EMPTY: Self = Self {
        id: RegistryId::FIRST,
        metadata: 0,
    };

    /// Helper to construct a new block ID
    pub const fn new(id: RegistryId, metadata: BlockMetadata) -> Self {
        Self { id, metadata }
    }

    /// The same block type with different metadata.
    pub const fn with_metadata(self, metadata: BlockMetadata) -> Self {
        Self { id: self.id, metadata }
    }

    /// Checks if this is the unset/air voxel, ignoring metadata.
    pub fn is_empty(self) -> bool {
        self.id == Self::EMPTY.id
    }

    /// Helper to look up the block definition corresponding to this ID
    pub fn lookup(self, registry: &BlockRegistry) -> Option<&BlockDefinition> {
        registry.lookup_id_to_object(self.id)
    }
}

impl Default for BlockEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Debug for BlockEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockEntry{{id={}, metadata=0x{:02X}}}", self.id, self.metadata)
    }
}

/// A definition of a block type, specifying properties used by the world generator.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// The unique registry name
    pub name: RegistryName,
    /// A color that can represent the block on maps, debug views, etc.
    pub representative_color: RGBA8,
    /// If the block fills its voxel and counts as ground
    pub solid: bool,
    /// If lower-priority generation stages may overwrite this block
    pub degradable: bool,
    /// If the first voxel of a surface layer made of this block records the layer thickness in its metadata
    pub stackable: bool,
    /// If the block is a liquid that caves must not carve into
    pub fluid: bool,
}

/// The registry name of [`EMPTY_BLOCK`]
pub const EMPTY_BLOCK_NAME: RegistryName = RegistryName::strata_const("empty");

/// The empty block definition, used when no specific blocks have been generated
pub static EMPTY_BLOCK: BlockDefinition = BlockDefinition {
    name: EMPTY_BLOCK_NAME,
    representative_color: RGBA8::new(0, 0, 0, 0),
    solid: false,
    degradable: true,
    stackable: false,
    fluid: false,
};

impl RegistryObject for BlockDefinition {
    fn registry_name(&self) -> RegistryNameRef {
        self.name.as_ref()
    }
}

impl BlockDefinition {
    /// A solid, non-degradable block such as stone.
    pub fn solid(name: RegistryName, representative_color: RGBA8) -> Self {
        Self {
            name,
            representative_color,
            solid: true,
            degradable: false,
            stackable: false,
            fluid: false,
        }
    }

    /// A non-solid block that other stages may overwrite, such as leaves or plants.
    pub fn decoration(name: RegistryName, representative_color: RGBA8) -> Self {
        Self {
            name,
            representative_color,
            solid: false,
            degradable: true,
            stackable: false,
            fluid: false,
        }
    }

    /// A liquid block.
    pub fn fluid(name: RegistryName, representative_color: RGBA8) -> Self {
        Self {
            name,
            representative_color,
            solid: false,
            degradable: true,
            stackable: false,
            fluid: true,
        }
    }

    /// Marks the block as a stackable surface layer.
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }
}

/// Creates a block registry that contains only [`EMPTY_BLOCK`], at the id of [`BlockEntry::EMPTY`].
pub fn new_block_registry() -> BlockRegistry {
    BlockRegistry::with_first(EMPTY_BLOCK.clone())
}
