//! Descriptions of generated ground layers and surface structures.

pub mod block_structure;
pub mod structure_model;

/// Access to the world surface height, for structures that follow the terrain.
pub trait SurfaceHeight {
    /// The surface height at the given world column.
    fn surface_height(&self, wx: i32, wz: i32) -> f32;
}
