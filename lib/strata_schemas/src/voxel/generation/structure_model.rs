//! Multi-voxel features scattered on the terrain surface: trees, plants, boulders and ground patches.
//!
//! Models receive a column position relative to the chunk origin that may lie outside of the chunk, they only paint
//! the voxels that [`Chunk::lies_in_chunk`] accepts. All random decisions come from the `rng` passed in, which the
//! caller seeds from the column's world coordinates, so every chunk a structure overlaps paints a consistent part.
//! Per-voxel decisions never draw from `rng` directly, they go through [`EdgeNoise`] keyed by world position, since
//! the number of voxels a chunk visits depends on where it cuts the structure.

use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::rng::RegionSeeder;
use crate::voxel::chunk::{Chunk, ChunkAccessError};
use crate::voxel::generation::SurfaceHeight;
use crate::voxel::voxeltypes::BlockEntry;

/// Leaf shapes of [`SimpleTree`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TreeShape {
    /// Square layers of leaves shrinking towards the top.
    Pyramid,
    /// A leaf ball with slightly ragged edges.
    #[default]
    Round,
    /// A short stem under a flattened leaf ellipsoid.
    Bush,
}

/// A tree made of a trunk and a leaf volume.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleTree {
    /// Leaf shape
    pub shape: TreeShape,
    /// Leaf block
    pub leaves: BlockEntry,
    /// Trunk block
    pub wood: BlockEntry,
    /// Block of the topmost trunk voxel
    pub top_wood: BlockEntry,
    /// Minimum height in blocks
    pub height: i32,
    /// Random extra height, in `0..height_variation`
    pub height_variation: i32,
}

/// A single column plant such as tall grass or cactus.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleVegetation {
    /// Plant block
    pub block: BlockEntry,
    /// Minimum height in blocks
    pub height: i32,
    /// Random extra height, in `0..height_variation`
    pub height_variation: i32,
}

/// A smooth blob of stone made from a point cloud potential.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Boulder {
    /// Boulder block
    pub block: BlockEntry,
    /// Average radius
    pub size: f32,
    /// Maximum deviation from the average radius
    pub size_variation: f32,
}

/// A small oval of different ground following the surface.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundPatch {
    /// Replacement ground block
    pub block: BlockEntry,
    /// Major half axis in blocks
    pub width: f32,
    /// Random variation of the width
    pub variation: f32,
    /// Depth below the surface in blocks
    pub depth: f32,
    /// Fraction of the ellipse that is filled completely, the rest thins out randomly towards the edge
    pub smoothness: f32,
}

/// Shape of a [`StructureModel`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StructureShape {
    /// See [`SimpleTree`]
    SimpleTree(SimpleTree),
    /// See [`SimpleVegetation`]
    SimpleVegetation(SimpleVegetation),
    /// See [`Boulder`]
    Boulder(Boulder),
    /// See [`GroundPatch`]
    GroundPatch(GroundPatch),
}

/// A structure that can be placed on the surface, with its per-column placement probability.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureModel {
    /// Chance of placing the structure on a given column, in `[0, 1]`
    pub chance: f32,
    /// The structure itself
    pub shape: StructureShape,
}

impl StructureModel {
    /// Wraps a shape with its placement chance.
    pub fn new(chance: f32, shape: StructureShape) -> Self {
        Self { chance, shape }
    }

    /// Places one instance standing on the relative position `(x, y, z)`, `y` being the first voxel above ground.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        y: i32,
        chunk: &mut Chunk,
        surface: &dyn SurfaceHeight,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        match &self.shape {
            StructureShape::SimpleTree(tree) => tree.generate(x, z, y, chunk, rng),
            StructureShape::SimpleVegetation(plant) => plant.generate(x, z, y, chunk, rng),
            StructureShape::Boulder(boulder) => boulder.generate(x, z, y, chunk, rng),
            StructureShape::GroundPatch(patch) => patch.generate(x, z, chunk, surface, rng),
        }
    }
}

fn roll_height<R: Rng + ?Sized>(height: i32, variation: i32, rng: &mut R) -> i32 {
    if variation > 0 {
        height + rng.gen_range(0..variation)
    } else {
        height
    }
}

/// Uniform values in `[0, 1)` per world voxel, fixed by one draw from the structure's stream.
struct EdgeNoise(RegionSeeder);

impl EdgeNoise {
    fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(RegionSeeder::new(rng.gen()))
    }

    fn sample(&self, chunk: &Chunk, x: i32, y: i32, z: i32) -> f32 {
        self.0
            .rng_at(chunk.world_x(x), chunk.world_y(y), chunk.world_z(z))
            .gen()
    }
}

fn put_if_degradable(chunk: &mut Chunk, x: i32, y: i32, z: i32, block: BlockEntry) -> Result<(), ChunkAccessError> {
    if chunk.lies_in_chunk(x, y, z) {
        chunk.update_block_if_degradable(x, y, z, block)?;
    }
    Ok(())
}

fn put_in_generation(chunk: &mut Chunk, x: i32, y: i32, z: i32, block: BlockEntry) -> Result<(), ChunkAccessError> {
    if chunk.lies_in_chunk(x, y, z) {
        chunk.update_block_in_generation(x, y, z, block)?;
    }
    Ok(())
}

impl SimpleTree {
    fn trunk(&self, x: i32, z: i32, y: i32, height: i32, chunk: &mut Chunk) -> Result<(), ChunkAccessError> {
        if chunk.voxel_size() > 2 {
            return Ok(());
        }
        let vs = chunk.voxel_size();
        let top = y + height - 1;
        for py in (chunk.start_index(y)..y + height).step_by(vs as usize) {
            let block = if py == top { self.top_wood } else { self.wood };
            put_if_degradable(chunk, x, py, z, block)?;
        }
        Ok(())
    }

    /// Places leaves in the ellipsoid `dx² + dz² + squash·dy² < r²`, ragged within a quarter block of the border.
    #[allow(clippy::too_many_arguments)]
    fn leaf_ball<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        center: i32,
        radius: i32,
        z_radius: i32,
        squash: i32,
        chunk: &mut Chunk,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        let vs = chunk.voxel_size() as usize;
        let float_radius = radius as f32 - rng.gen::<f32>();
        let outer = float_radius * float_radius;
        let inner = (float_radius - 0.25) * (float_radius - 0.25);
        let edge = EdgeNoise::new(rng);
        for py in (chunk.start_index(center - radius)..center + radius).step_by(vs) {
            for px in (chunk.start_index(x - radius)..=x + radius).step_by(vs) {
                for pz in (chunk.start_index(z - z_radius)..=z + z_radius).step_by(vs) {
                    if !chunk.lies_in_chunk(px, py, pz) {
                        continue;
                    }
                    let dist = ((px - x).pow(2) + (pz - z).pow(2) + squash * (py - center).pow(2)) as f32;
                    if dist < outer && (dist < inner || edge.sample(chunk, px, py, pz) < 0.5) {
                        chunk.update_block_if_degradable(px, py, pz, self.leaves)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        y: i32,
        chunk: &mut Chunk,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        let mut height = roll_height(self.height, self.height_variation, rng);
        let vs = chunk.voxel_size();

        if vs >= 16 {
            // Coarse detail levels drop the trunk, keep a leaf or two so the tree stays visible.
            put_if_degradable(chunk, x, y, z, self.leaves)?;
            put_if_degradable(chunk, x, y + vs, z, self.leaves)?;
            return Ok(());
        }
        if y >= chunk.width() {
            return Ok(());
        }

        match self.shape {
            TreeShape::Pyramid => {
                self.trunk(x, z, y, height, chunk)?;
                height = (3 * height) >> 1;
                for py in (chunk.start_index(y + height / 3)..y + height).step_by(vs as usize) {
                    let j = (height - (py - y)) / 2;
                    for px in (chunk.start_index(x + 1 - j)..x + j).step_by(vs as usize) {
                        for pz in (chunk.start_index(z + 1 - j)..z + j).step_by(vs as usize) {
                            put_if_degradable(chunk, px, py, pz, self.leaves)?;
                        }
                    }
                }
            }
            TreeShape::Round => {
                self.trunk(x, z, y, height, chunk)?;
                let radius = 1 + height / 2;
                self.leaf_ball(x, z, y + height, radius, radius, 1, chunk, rng)?;
            }
            TreeShape::Bush => {
                let stem = height.min(2);
                self.trunk(x, z, y, stem, chunk)?;
                let radius = height / 2 + 1;
                self.leaf_ball(x, z, y + stem, radius, radius / 2, 4, chunk, rng)?;
            }
        }
        Ok(())
    }
}

impl SimpleVegetation {
    fn generate<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        y: i32,
        chunk: &mut Chunk,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        let height = roll_height(self.height, self.height_variation, rng);
        for py in (chunk.start_index(y)..y + height).step_by(chunk.voxel_size() as usize) {
            put_if_degradable(chunk, x, py, z, self.block)?;
        }
        Ok(())
    }
}

impl Boulder {
    fn generate<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        y: i32,
        chunk: &mut Chunk,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        const POINTS: usize = 4;
        let radius = self.size + self.size_variation * (rng.gen::<f32>() * 2.0 - 1.0);
        let mut cloud = [[0f32; 3]; POINTS];
        for point in cloud.iter_mut().flatten() {
            *point = (rng.gen::<f32>() - 0.5) * radius / 2.0;
        }
        let vs = chunk.voxel_size() as usize;
        let r = radius as i32;
        // The potential 1/n Σ (r/2)²/|p - c|² is at least 1 only inside the 2r cube.
        for px in (chunk.start_index(x - r)..=x + r).step_by(vs) {
            for py in (chunk.start_index(y - r)..=y + r).step_by(vs) {
                for pz in (chunk.start_index(z - r)..=z + r).step_by(vs) {
                    if !chunk.lies_in_chunk(px, py, pz) {
                        continue;
                    }
                    let potential: f32 = cloud
                        .iter()
                        .map(|[cx, cy, cz]| {
                            let dx = (px - x) as f32 - cx;
                            let dy = (py - y) as f32 - cy;
                            let dz = (pz - z) as f32 - cz;
                            1.0 / (dx * dx + dy * dy + dz * dz)
                        })
                        .sum::<f32>()
                        * radius
                        * radius
                        / 4.0
                        / POINTS as f32;
                    if potential >= 1.0 {
                        chunk.update_block_in_generation(px, py, pz, self.block)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl GroundPatch {
    fn generate<R: Rng + ?Sized>(
        &self,
        x: i32,
        z: i32,
        chunk: &mut Chunk,
        surface: &dyn SurfaceHeight,
        rng: &mut R,
    ) -> Result<(), ChunkAccessError> {
        let width = self.width + (rng.gen::<f32>() - 0.5) * self.variation;
        if width <= 0.0 {
            return Ok(());
        }
        let orientation = TAU * rng.gen::<f32>();
        let ellipse_param = 1.0 + rng.gen::<f32>();
        // Major and minor half axes, the minor one is 1/ellipse_param of the major one.
        let (sin, cos) = orientation.sin_cos();
        let (x_main, z_main) = (sin / width, cos / width);
        let (x_secn, z_secn) = (ellipse_param * cos / width, -ellipse_param * sin / width);
        let edge = EdgeNoise::new(rng);

        let vs = chunk.voxel_size() as usize;
        let last = chunk.width() - 1;
        let x_min = ((x as f32 - width) as i32).max(0);
        let x_max = ((x as f32 + width) as i32).min(last);
        let z_min = ((z as f32 - width) as i32).max(0);
        let z_max = ((z as f32 + width) as i32).min(last);
        let origin_y = chunk.origin().y;
        for px in (chunk.start_index(x_min)..=x_max).step_by(vs) {
            for pz in (chunk.start_index(z_min)..=z_max).step_by(vs) {
                let main = x_main * (x - px) as f32 + z_main * (z - pz) as f32;
                let secn = x_secn * (x - px) as f32 + z_secn * (z - pz) as f32;
                let dist = main * main + secn * secn;
                if dist > 1.0 {
                    continue;
                }
                let top = surface.surface_height(chunk.world_x(px), chunk.world_z(pz)).floor() as i32;
                let bottom = (top as f32 - self.depth + 1.0) as i32;
                for wy in (bottom..=top).filter(|wy| wy & (vs as i32 - 1) == 0) {
                    let py = wy - origin_y;
                    let keep = dist <= self.smoothness
                        || (dist - self.smoothness) / (1.0 - self.smoothness) < edge.sample(chunk, px, py, pz);
                    if keep {
                        put_in_generation(chunk, px, py, pz, self.block)?;
                    }
                }
            }
        }
        Ok(())
    }
}
