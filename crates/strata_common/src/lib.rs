#![warn(missing_docs)]
#![deny(clippy::disallowed_types)]

//! The Strata world generation engine: builtin content, generator stages and the world coordinator

pub mod config;
pub mod prelude;
pub mod voxel;
