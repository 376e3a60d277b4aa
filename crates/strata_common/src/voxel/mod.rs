//! Voxel world generation: builtin content, generator stages and world coordination

pub mod biome_distribution;
pub mod biomes;
pub mod blocks;
pub mod generator;
pub mod map_generator;
pub mod ores;
pub mod world;
