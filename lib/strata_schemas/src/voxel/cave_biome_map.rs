//! Low resolution 3D map of underground biomes.
use std::sync::Arc;

use bevy_math::IVec3;

use crate::voxel::biome::BiomeDefinition;
use crate::voxel::map_fragment::SurfaceMap;

/// Base-2 logarithm of the cell size of a [`CaveBiomeMapFragment`], in blocks.
pub const CAVE_BIOME_SHIFT: i32 = 7;
/// Cell size in blocks.
pub const CAVE_BIOME_SIZE: i32 = 1 << CAVE_BIOME_SHIFT;
/// Base-2 logarithm of the side length of a [`CaveBiomeMapFragment`], in blocks.
pub const CAVE_BIOME_MAP_SHIFT: i32 = 11;
/// Side length of a fragment in blocks.
pub const CAVE_BIOME_MAP_SIZE: i32 = 1 << CAVE_BIOME_MAP_SHIFT;
/// Number of cells along one side of a fragment.
pub const CAVE_BIOME_CELLS: i32 = CAVE_BIOME_MAP_SIZE / CAVE_BIOME_SIZE;

/// Positions from this many blocks below the surface upwards use the surface biome.
pub const SURFACE_BIOME_DEPTH: f32 = 32.0;
/// Positions up to this many blocks above the surface use the surface biome.
pub const SURFACE_BIOME_HEIGHT: f32 = 128.0;

/// One biome per [`CAVE_BIOME_SIZE`]³ cell over a [`CAVE_BIOME_MAP_SIZE`]³ volume, independent of the voxel size.
#[derive(Clone, Debug)]
pub struct CaveBiomeMapFragment {
    origin: IVec3,
    biomes: Box<[Arc<BiomeDefinition>]>,
}

impl CaveBiomeMapFragment {
    /// Origin of the fragment containing the given world position.
    pub fn origin_containing(wx: i32, wy: i32, wz: i32) -> IVec3 {
        IVec3::new(wx, wy, wz) & IVec3::splat(!(CAVE_BIOME_MAP_SIZE - 1))
    }

    /// A fragment covered by a single biome, to be filled by a biome distribution.
    pub fn new(origin: IVec3, biome: Arc<BiomeDefinition>) -> Self {
        let n = (CAVE_BIOME_CELLS * CAVE_BIOME_CELLS * CAVE_BIOME_CELLS) as usize;
        Self {
            origin,
            biomes: vec![biome; n].into_boxed_slice(),
        }
    }

    /// World position of the first cell.
    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    /// Index of a cell from its cell coordinates relative to the fragment.
    #[inline]
    pub fn get_index(cx: i32, cy: i32, cz: i32) -> usize {
        ((cx << 8) | (cy << 4) | cz) as usize
    }

    /// Checks if the world position is inside this fragment.
    pub fn contains(&self, wx: i32, wy: i32, wz: i32) -> bool {
        Self::origin_containing(wx, wy, wz) == self.origin
    }

    fn index_of(&self, wx: i32, wy: i32, wz: i32) -> usize {
        let rel = (IVec3::new(wx, wy, wz).wrapping_sub(self.origin) >> IVec3::splat(CAVE_BIOME_SHIFT))
            .clamp(IVec3::ZERO, IVec3::splat(CAVE_BIOME_CELLS - 1));
        Self::get_index(rel.x, rel.y, rel.z)
    }

    /// The biome of the cell containing the world position, clamped to the fragment.
    pub fn get_biome(&self, wx: i32, wy: i32, wz: i32) -> &Arc<BiomeDefinition> {
        &self.biomes[self.index_of(wx, wy, wz)]
    }

    /// Sets the biome of a cell by its relative cell coordinates.
    pub fn set_cell(&mut self, cx: i32, cy: i32, cz: i32, biome: Arc<BiomeDefinition>) {
        let max = CAVE_BIOME_CELLS - 1;
        self.biomes[Self::get_index(cx.clamp(0, max), cy.clamp(0, max), cz.clamp(0, max))] = biome;
    }
}

/// Biome lookup around one chunk: the surface biome near the surface, the cave biome elsewhere.
#[derive(Clone, Debug)]
pub struct CaveBiomeMap {
    surface: SurfaceMap,
    fragments: Vec<Arc<CaveBiomeMapFragment>>,
}

impl CaveBiomeMap {
    /// Creates a view; at least one cave fragment must be given.
    pub fn new(surface: SurfaceMap, fragments: Vec<Arc<CaveBiomeMapFragment>>) -> Option<Self> {
        if fragments.is_empty() {
            None
        } else {
            Some(Self { surface, fragments })
        }
    }

    /// The surface view this map was built with.
    pub fn surface(&self) -> &SurfaceMap {
        &self.surface
    }

    /// Terrain height of the world column.
    pub fn surface_height(&self, wx: i32, wz: i32) -> f32 {
        self.surface.get_height(wx, wz)
    }

    /// The underground biome at the world position, ignoring the surface.
    pub fn cave_biome_at(&self, wx: i32, wy: i32, wz: i32) -> &Arc<BiomeDefinition> {
        self.fragments
            .iter()
            .find(|f| f.contains(wx, wy, wz))
            .unwrap_or(&self.fragments[0])
            .get_biome(wx, wy, wz)
    }

    /// The biome governing the world position.
    pub fn biome_at(&self, wx: i32, wy: i32, wz: i32) -> &Arc<BiomeDefinition> {
        let height = self.surface.get_height(wx, wz);
        let y = wy as f32;
        if y >= height - SURFACE_BIOME_DEPTH && y <= height + SURFACE_BIOME_HEIGHT {
            self.surface.get_biome(wx, wz)
        } else {
            self.cave_biome_at(wx, wy, wz)
        }
    }
}
