//! 2D surface data: terrain height and surface biome per world column.
use std::sync::Arc;

use crate::voxel::biome::BiomeDefinition;
use crate::voxel::generation::SurfaceHeight;

/// Base-2 logarithm of the number of columns along one side of a [`MapFragment`].
pub const MAP_SHIFT: i32 = 8;
/// Number of columns along one side of a [`MapFragment`].
pub const MAP_SIZE: i32 = 1 << MAP_SHIFT;

/// Identifies a map fragment: world origin and voxel size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MapFragmentKey {
    /// World X of the first column
    pub wx: i32,
    /// World Z of the first column
    pub wz: i32,
    /// Distance between sampled columns
    pub voxel_size: i32,
}

impl MapFragmentKey {
    /// The key of the fragment containing the given world column at the given voxel size.
    pub fn containing(wx: i32, wz: i32, voxel_size: i32) -> Self {
        let mask = !(Self::width_at(voxel_size) - 1);
        Self {
            wx: wx & mask,
            wz: wz & mask,
            voxel_size,
        }
    }

    /// Width in world blocks of fragments at a voxel size.
    #[inline]
    pub fn width_at(voxel_size: i32) -> i32 {
        MAP_SIZE * voxel_size
    }

    /// Width in world blocks of this fragment.
    #[inline]
    pub fn width(self) -> i32 {
        Self::width_at(self.voxel_size)
    }

    /// Checks if the world column is inside this fragment.
    #[inline]
    pub fn contains(self, wx: i32, wz: i32) -> bool {
        let (rx, rz) = (wx.wrapping_sub(self.wx), wz.wrapping_sub(self.wz));
        rx >= 0 && rx < self.width() && rz >= 0 && rz < self.width()
    }
}

/// A square of [`MAP_SIZE`]² columns sampled every `voxel_size` blocks, immutable once generated.
#[derive(Clone, Debug)]
pub struct MapFragment {
    key: MapFragmentKey,
    heights: Box<[f32]>,
    biomes: Box<[Arc<BiomeDefinition>]>,
}

impl MapFragment {
    /// A flat fragment at height 0, covered by one biome.
    pub fn new(key: MapFragmentKey, biome: Arc<BiomeDefinition>) -> Self {
        let n = (MAP_SIZE * MAP_SIZE) as usize;
        Self {
            key,
            heights: vec![0.0; n].into_boxed_slice(),
            biomes: vec![biome; n].into_boxed_slice(),
        }
    }

    /// Position and resolution.
    pub fn key(&self) -> MapFragmentKey {
        self.key
    }

    /// Index of a world column, clamped to the fragment edge and rounded down to the column lattice.
    fn index(&self, wx: i32, wz: i32) -> usize {
        let shift = self.key.voxel_size.trailing_zeros();
        let rx = (wx.wrapping_sub(self.key.wx) >> shift).clamp(0, MAP_SIZE - 1);
        let rz = (wz.wrapping_sub(self.key.wz) >> shift).clamp(0, MAP_SIZE - 1);
        (rx * MAP_SIZE + rz) as usize
    }

    /// Terrain height of the world column.
    pub fn get_height(&self, wx: i32, wz: i32) -> f32 {
        self.heights[self.index(wx, wz)]
    }

    /// Surface biome of the world column.
    pub fn get_biome(&self, wx: i32, wz: i32) -> &Arc<BiomeDefinition> {
        &self.biomes[self.index(wx, wz)]
    }

    /// Sets the data of the column at lattice coordinates `(rx, rz)` inside the fragment.
    pub fn set_column(&mut self, rx: i32, rz: i32, height: f32, biome: Arc<BiomeDefinition>) {
        debug_assert!((0..MAP_SIZE).contains(&rx) && (0..MAP_SIZE).contains(&rz));
        let idx = (rx.clamp(0, MAP_SIZE - 1) * MAP_SIZE + rz.clamp(0, MAP_SIZE - 1)) as usize;
        self.heights[idx] = height;
        self.biomes[idx] = biome;
    }
}

/// Surface data around one chunk, possibly spread over several fragments.
#[derive(Clone, Debug)]
pub struct SurfaceMap {
    fragments: Vec<Arc<MapFragment>>,
}

impl SurfaceMap {
    /// Creates a view over fragments; at least one fragment must be given.
    pub fn new(fragments: Vec<Arc<MapFragment>>) -> Option<Self> {
        if fragments.is_empty() {
            None
        } else {
            Some(Self { fragments })
        }
    }

    fn fragment(&self, wx: i32, wz: i32) -> &MapFragment {
        self.fragments
            .iter()
            .find(|f| f.key.contains(wx, wz))
            .unwrap_or(&self.fragments[0])
    }

    /// Terrain height of the world column; columns outside every fragment read the nearest edge of the first one.
    pub fn get_height(&self, wx: i32, wz: i32) -> f32 {
        self.fragment(wx, wz).get_height(wx, wz)
    }

    /// Surface biome of the world column.
    pub fn get_biome(&self, wx: i32, wz: i32) -> &Arc<BiomeDefinition> {
        self.fragment(wx, wz).get_biome(wx, wz)
    }

    /// The fragments of the view.
    pub fn fragments(&self) -> &[Arc<MapFragment>] {
        &self.fragments
    }
}

impl SurfaceHeight for SurfaceMap {
    fn surface_height(&self, wx: i32, wz: i32) -> f32 {
        self.get_height(wx, wz)
    }
}
