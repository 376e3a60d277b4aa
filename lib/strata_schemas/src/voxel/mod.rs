//! All voxel storage and world generation data types

pub mod biome;
pub mod cave_biome_map;
pub mod chunk;
pub mod chunk_storage;
pub mod generation;
pub mod map_fragment;
pub mod ore;
pub mod voxeltypes;
