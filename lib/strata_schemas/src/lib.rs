#![warn(missing_docs)]
#![deny(clippy::disallowed_types)]

//! A library crate of the in-memory representations of the world generator's core data:
//! registries, coordinates, chunks, biomes, surface and cave maps.

pub mod coordinates;
pub mod registries;
pub mod registry;
pub mod rng;
pub mod voxel;

/// Re-exported dependencies used in API types
pub mod dependencies {
    pub use anyhow;
    pub use bevy_math;
    pub use bytemuck;
    pub use hashbrown;
    pub use itertools;
    pub use kstring;
    pub use rand;
    pub use rand_xoshiro;
    pub use rgb;
    pub use serde;
    pub use smallvec;
    pub use thiserror;
}
