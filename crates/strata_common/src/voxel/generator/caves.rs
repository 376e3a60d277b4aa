//! Cave carving stages.

use bevy_math::DVec3;
use noise::{Fbm, MultiFractal, NoiseFn, SuperSimplex};
use rand::Rng;
use strata_schemas::registry::RegistryName;
use strata_schemas::rng::{rng_from_seed, GenRng};
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::voxeltypes::BlockEntry;

use super::{GenerationContext, GeneratorStage};
use crate::prelude::*;

/// Registry name of [`FractalCaveStage`].
pub const FRACTAL_CAVE_STAGE_NAME: RegistryName = RegistryName::strata_const("fractal_cave");
/// Registry name of [`NoiseCaveStage`].
pub const NOISE_CAVE_STAGE_NAME: RegistryName = RegistryName::strata_const("noise_cave");

/// Caves are only carved into chunks up to this voxel size.
pub const MAX_CAVE_VOXEL_SIZE: i32 = 2;

/// Empties a voxel unless it holds a fluid.
fn carve(chunk: &mut Chunk, x: i32, y: i32, z: i32) -> Result<()> {
    let old = chunk.get_block(x, y, z)?;
    if old.is_empty() || old.lookup(chunk.block_registry()).is_some_and(|def| def.fluid) {
        return Ok(());
    }
    chunk.update_block_in_generation(x, y, z, BlockEntry::EMPTY)?;
    Ok(())
}

/// Carves the voxels of column `(x, z)` with relative heights in `[y_min, y_max)`.
fn carve_range(chunk: &mut Chunk, x: i32, z: i32, y_min: i32, y_max: i32) -> Result<()> {
    let y_min = chunk.start_index(y_min.max(0));
    let y_max = y_max.min(chunk.width());
    for y in (y_min..y_max).step_by(chunk.voxel_size() as usize) {
        carve(chunk, x, y, z)?;
    }
    Ok(())
}

const CELL_SHIFT: i32 = 5;
const CELL_SIZE: i32 = 1 << CELL_SHIFT;
const RANGE: i32 = 8;
const BRANCH_LENGTH: f64 = 64.0;
const SPLITTING_CHANCE: f32 = 0.4;
const SPLIT_FACTOR: f64 = 1.0;
const Y_SPLIT_REDUCTION: f64 = 0.5;
const MAX_SPLIT_LENGTH: f64 = 128.0;
const BRANCH_CHANCE: f32 = 0.4;
const MIN_RADIUS: f64 = 2.0;
const MAX_INITIAL_RADIUS: f64 = 5.0;
const HEIGHT_VARIANCE: f64 = 0.15;
const MAX_CAVE_HEIGHT: f64 = 128.0;
const CAVE_HEIGHT_WITH_MAX_DENSITY: f64 = -512.0;
const MAX_CAVE_DENSITY: f64 = 1.0 / 32.0;

/// Branching tunnels built by recursive midpoint displacement between random points of nearby 32³ cells.
#[derive(Clone, Debug, Default)]
pub struct FractalCaveStage;

/// One tunnel segment with its bending bias and radii.
#[derive(Copy, Clone, Debug)]
struct Segment {
    start: DVec3,
    end: DVec3,
    bias: DVec3,
    start_radius: f64,
    end_radius: f64,
}

/// The chunk being carved and the region its tunnels may reach.
struct CaveCarver<'c> {
    chunk: &'c mut Chunk,
    origin: DVec3,
    width: f64,
}

/// A die roll in `0..6` for the wall voxel at relative `(x, y, z)`.
fn wall_roll(walls: &RegionSeeder, chunk: &Chunk, x: i32, y: i32, z: i32) -> u32 {
    walls
        .rng_at(chunk.world_x(x), chunk.world_y(y), chunk.world_z(z))
        .gen_range(0..6)
}

fn rand_signed(rng: &mut GenRng) -> f64 {
    2.0 * rng.gen::<f64>() - 1.0
}

impl CaveCarver<'_> {
    fn carve_sphere(&mut self, rng: &mut GenRng, center: DVec3, radius: f64) -> Result<()> {
        // Rough wall voxels are decided per world position, independent of where the chunk cuts the sphere.
        let walls = RegionSeeder::new(rng.gen());
        let rel = center - self.origin;
        let vs = self.chunk.voxel_size();
        let width = self.chunk.width();
        let x_min = self.chunk.start_index(((rel.x - radius) as i32 - 1).max(0));
        let x_max = ((rel.x + radius) as i32 + 1).min(width);
        let z_min = self.chunk.start_index(((rel.z - radius) as i32 - 1).max(0));
        let z_max = ((rel.z + radius) as i32 + 1).min(width);
        if x_min >= x_max || z_min >= z_max || rel.y - radius + 1.0 >= f64::from(width) || rel.y + radius + 1.0 < 0.0 {
            return Ok(());
        }
        for x in (x_min..x_max).step_by(vs as usize) {
            let dx = (f64::from(x) - rel.x) / radius;
            for z in (z_min..z_max).step_by(vs as usize) {
                let dz = (f64::from(z) - rel.z) / radius;
                let inner = 0.81 - dx * dx - dz * dz;
                let y_extent = if inner > 0.0 { radius * inner.sqrt() } else { 0.0 };
                let y_min = (rel.y - y_extent) as i32;
                let y_max = (rel.y + y_extent) as i32;
                carve_range(self.chunk, x, z, y_min, y_max)?;
                // Rough walls: most voxels of the upper shell are removed, few of the lower one.
                let mut y = self.chunk.start_index(y_max.max(0));
                while y < width {
                    let dy = (f64::from(y) - rel.y) / radius;
                    if dx * dx + dy * dy + dz * dz >= 1.0 {
                        break;
                    }
                    if wall_roll(&walls, self.chunk, x, y, z) != 0 {
                        carve(self.chunk, x, y, z)?;
                    }
                    y += vs;
                }
                let mut y = (y_min.min(width - 1)) & !(vs - 1);
                while y >= 0 {
                    let dy = (f64::from(y) - rel.y) / radius;
                    if dx * dx + dy * dy + dz * dz >= 1.0 {
                        break;
                    }
                    if wall_roll(&walls, self.chunk, x, y, z) == 0 {
                        carve(self.chunk, x, y, z)?;
                    }
                    y -= vs;
                }
            }
        }
        Ok(())
    }

    fn may_touch(&self, segment: &Segment, safety: f64) -> bool {
        let min = segment.start.min(segment.end) - DVec3::splat(safety);
        let max = segment.start.max(segment.end) + DVec3::splat(safety);
        let chunk_max = self.origin + DVec3::splat(self.width);
        min.cmplt(chunk_max).all() && max.cmpgt(self.origin).all()
    }

    fn cave_between(&mut self, seed: u64, segment: Segment, randomness: f64) -> Result<()> {
        let distance = segment.start.distance(segment.end);
        let max_shift = distance * randomness;
        if !self.may_touch(&segment, segment.start_radius.max(segment.end_radius) + max_shift) {
            return Ok(());
        }
        let mut rng = rng_from_seed(seed);
        if distance < f64::from(self.chunk.voxel_size()) {
            return self.carve_sphere(&mut rng, segment.start, segment.start_radius);
        }
        let mid = (segment.start + segment.end) / 2.0
            + DVec3::new(rand_signed(&mut rng), rand_signed(&mut rng), rand_signed(&mut rng)) * max_shift
            + segment.bias / 4.0;
        let mid_radius = ((segment.start_radius + segment.end_radius) / 2.0
            + max_shift * rand_signed(&mut rng) * HEIGHT_VARIANCE)
            .max(MIN_RADIUS);
        let bias = segment.bias / 4.0;
        self.cave_between(
            rng.gen(),
            Segment {
                end: mid,
                bias,
                end_radius: mid_radius,
                ..segment
            },
            randomness,
        )?;
        self.cave_between(
            rng.gen(),
            Segment {
                start: mid,
                bias,
                start_radius: mid_radius,
                ..segment
            },
            randomness,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn branching_cave_between(
        &mut self,
        seed: u64,
        mut segment: Segment,
        seed_point: DVec3,
        branch_length: f64,
        randomness: f64,
        is_start: bool,
        is_end: bool,
    ) -> Result<()> {
        let distance = segment.start.distance(segment.end);
        let mut rng = rng_from_seed(seed);
        if distance < 32.0 {
            // No more branching below this length.
            self.cave_between(rng.gen(), segment, randomness)?;
            if !is_start && rng.gen::<f32>() < BRANCH_CHANCE && branch_length > 8.0 {
                let mut end = segment.start
                    + DVec3::new(rand_signed(&mut rng), rand_signed(&mut rng), rand_signed(&mut rng)) * branch_length;
                let max_reach = f64::from((RANGE - 1) * CELL_SIZE);
                let to_seed = end.distance(seed_point);
                if to_seed > max_reach {
                    end = seed_point + (end - seed_point) / to_seed * max_reach;
                }
                let start_radius = (segment.start_radius - MIN_RADIUS) * rng.gen::<f64>() + MIN_RADIUS;
                let bias = DVec3::new(
                    branch_length * rand_signed(&mut rng),
                    branch_length * (rng.gen::<f64>() - 0.5),
                    branch_length * rand_signed(&mut rng),
                );
                let randomness = (randomness + randomness * rng.gen::<f64>() * rng.gen::<f64>()).min(0.5);
                let branch = Segment {
                    start: segment.start,
                    end,
                    bias,
                    start_radius,
                    end_radius: MIN_RADIUS,
                };
                self.branching_cave_between(
                    rng.gen(),
                    branch,
                    seed_point,
                    branch_length / 2.0,
                    randomness,
                    true,
                    true,
                )?;
            }
            return Ok(());
        }

        let max_shift = distance * randomness;
        // Slightly random subdivision avoids regular patterns.
        let weight = 0.25 + rng.gen::<f64>() * 0.5;
        let w1 = (1.0 - weight) * (1.0 - weight);
        let w2 = weight * weight;
        let midpoint = |rng: &mut GenRng, segment: &Segment| {
            segment.start * weight
                + segment.end * (1.0 - weight)
                + DVec3::new(rand_signed(rng), rand_signed(rng), rand_signed(rng)) * max_shift
                + segment.bias * weight * (1.0 - weight)
        };
        if !is_start && !is_end && distance < MAX_SPLIT_LENGTH && rng.gen::<f32>() < SPLITTING_CHANCE {
            // Split into two parallel tunnels, offset perpendicular to the bias.
            let split_x = rng.gen::<f64>() - 0.5;
            let split_y = Y_SPLIT_REDUCTION * (rng.gen::<f64>() - 0.5);
            let split_length = (split_x * split_x + split_y * split_y).sqrt().max(f64::EPSILON);
            let (split_x, split_y) = (split_x / split_length, split_y / split_length);
            let bias_length = segment.bias.length().max(f64::EPSILON);
            let offset = DVec3::new(
                split_x * SPLIT_FACTOR * distance * segment.bias.z / bias_length,
                split_y * SPLIT_FACTOR * distance,
                -split_x * SPLIT_FACTOR * distance * segment.bias.x / bias_length,
            );
            segment.bias += offset;
            let mid = midpoint(&mut rng, &segment);
            let mid_radius = ((segment.start_radius + segment.end_radius) / 2.0
                + max_shift * rand_signed(&mut rng) * HEIGHT_VARIANCE)
                .max(MIN_RADIUS);
            self.split_at(
                &mut rng,
                segment,
                (mid, mid_radius),
                (w1, w2),
                seed_point,
                branch_length,
                randomness,
                (is_start, is_end),
            )?;

            segment.bias -= 2.0 * offset;
            segment.start_radius = (segment.start_radius - MIN_RADIUS) * rng.gen::<f64>() + MIN_RADIUS;
            segment.end_radius = (segment.start_radius - MIN_RADIUS) * rng.gen::<f64>() + MIN_RADIUS;
        }
        let mid = midpoint(&mut rng, &segment);
        let mid_radius = ((segment.start_radius + segment.end_radius) / 2.0
            + max_shift * (2.0 * rng.gen::<f64>() - 2.0) * HEIGHT_VARIANCE)
            .max(MIN_RADIUS);
        self.split_at(
            &mut rng,
            segment,
            (mid, mid_radius),
            (w1, w2),
            seed_point,
            branch_length,
            randomness,
            (is_start, is_end),
        )
    }

    /// Recurses into both halves of `segment` around `mid`.
    #[allow(clippy::too_many_arguments)]
    fn split_at(
        &mut self,
        rng: &mut GenRng,
        segment: Segment,
        (mid, mid_radius): (DVec3, f64),
        (w1, w2): (f64, f64),
        seed_point: DVec3,
        branch_length: f64,
        randomness: f64,
        (is_start, is_end): (bool, bool),
    ) -> Result<()> {
        let first = Segment {
            end: mid,
            bias: segment.bias * w1,
            end_radius: mid_radius,
            ..segment
        };
        self.branching_cave_between(rng.gen(), first, seed_point, branch_length, randomness, is_start, false)?;
        let second = Segment {
            start: mid,
            bias: segment.bias * w2,
            start_radius: mid_radius,
            ..segment
        };
        self.branching_cave_between(rng.gen(), second, seed_point, branch_length, randomness, false, is_end)
    }

    fn random_point_in_cell(rng: &mut GenRng, x: i32, y: i32, z: i32) -> DVec3 {
        DVec3::new(
            f64::from((x << CELL_SHIFT) + rng.gen_range(0..CELL_SIZE)),
            f64::from((y << CELL_SHIFT) + rng.gen_range(0..CELL_SIZE)),
            f64::from((z << CELL_SHIFT) + rng.gen_range(0..CELL_SIZE)),
        )
    }

    fn consider_cell(&mut self, seeder: &RegionSeeder, x: i32, y: i32, z: i32) -> Result<()> {
        let mut rng = seeder.rng_at(x, y, z);
        let start = Self::random_point_in_cell(&mut rng, x, y, z);
        // The density saturates deep down and vanishes high up.
        let density = MAX_CAVE_DENSITY
            * ((MAX_CAVE_HEIGHT - start.y) / (MAX_CAVE_HEIGHT - CAVE_HEIGHT_WITH_MAX_DENSITY)).min(1.0);
        if rng.gen::<f64>() >= density {
            return Ok(());
        }
        let starters = 1 + rng.gen_range(0..4);
        let seed_point = DVec3::new(
            f64::from(x << CELL_SHIFT),
            f64::from(y << CELL_SHIFT),
            f64::from(z << CELL_SHIFT),
        );
        for _ in 0..starters {
            let end_cell = [x, y, z].map(|c| c + rng.gen_range(0..2 * RANGE - 2) - (RANGE - 1));
            // Every cell shares its end point with all tunnels ending there, which connects the caves.
            let mut end_rng = seeder.rng_at(end_cell[0], end_cell[1], end_cell[2]);
            let end = Self::random_point_in_cell(&mut end_rng, end_cell[0], end_cell[1], end_cell[2]);
            let start_radius = end_rng.gen::<f64>() * MAX_INITIAL_RADIUS + 2.0 * MIN_RADIUS;
            let end_radius = end_rng.gen::<f64>() * MAX_INITIAL_RADIUS + 2.0 * MIN_RADIUS;
            let length = start.distance(end);
            let bias = DVec3::new(
                length * (end_rng.gen::<f64>() - 0.5),
                length * (end_rng.gen::<f64>() - 0.5) / 2.0,
                length * (end_rng.gen::<f64>() - 0.5),
            );
            let segment = Segment {
                start,
                end,
                bias,
                start_radius,
                end_radius,
            };
            self.branching_cave_between(end_rng.gen(), segment, seed_point, BRANCH_LENGTH, 0.1, true, true)?;
        }
        Ok(())
    }
}

impl GeneratorStage for FractalCaveStage {
    fn registry_name(&self) -> RegistryName {
        FRACTAL_CAVE_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        65536
    }

    fn generator_seed(&self) -> u64 {
        0xb898ec9ce9d2ef37
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, _ctx: &GenerationContext) -> Result<()> {
        if chunk.voxel_size() > MAX_CAVE_VOXEL_SIZE {
            return Ok(());
        }
        let seeder = RegionSeeder::new(seed);
        let origin = *chunk.origin();
        let cells = chunk.width() >> CELL_SHIFT;
        let cell = origin >> CELL_SHIFT;
        let mut carver = CaveCarver {
            origin: origin.as_dvec3(),
            width: f64::from(chunk.width()),
            chunk,
        };
        for x in cell.x - RANGE..cell.x + cells + RANGE {
            for y in cell.y - RANGE..cell.y + cells + RANGE {
                for z in cell.z - RANGE..cell.z + cells + RANGE {
                    carver.consider_cell(&seeder, x, y, z)?;
                }
            }
        }
        Ok(())
    }
}

/// Size in blocks of the lattice the cave noise is sampled on and interpolated between.
const NOISE_CELL: i32 = 4;
/// Horizontal and vertical feature size of noise caves, in blocks.
const NOISE_SCALE: f64 = 64.0;
/// Noise values above this become cave.
const NOISE_THRESHOLD: f64 = 0.38;
/// Noise caves fade out over this many blocks below the surface.
const SURFACE_FADE: f64 = 24.0;

/// Caverns carved where 3D fractal noise exceeds a threshold.
///
/// The noise is sampled on a 4-block lattice and interpolated trilinearly in between.
#[derive(Clone, Debug)]
pub struct NoiseCaveStage {
    octaves: usize,
}

impl Default for NoiseCaveStage {
    fn default() -> Self {
        Self { octaves: 4 }
    }
}

impl NoiseCaveStage {
    fn cave_value(noise: &Fbm<SuperSimplex>, ctx: &GenerationContext, wx: i32, wy: i32, wz: i32) -> f64 {
        let p = [f64::from(wx), f64::from(wy), f64::from(wz)].map(|c| c / NOISE_SCALE);
        let depth = f64::from(ctx.surface().get_height(wx, wz)) - f64::from(wy);
        // Close to the surface caves get rarer, so they do not riddle the ground.
        let fade = ((SURFACE_FADE - depth) / SURFACE_FADE).clamp(0.0, 1.0);
        noise.get(p) - NOISE_THRESHOLD - fade
    }
}

impl GeneratorStage for NoiseCaveStage {
    fn registry_name(&self) -> RegistryName {
        NOISE_CAVE_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        65536
    }

    fn generator_seed(&self) -> u64 {
        0x76490367012869
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, ctx: &GenerationContext) -> Result<()> {
        let vs = chunk.voxel_size();
        if vs > MAX_CAVE_VOXEL_SIZE {
            return Ok(());
        }
        let noise = Fbm::<SuperSimplex>::new(seed as u32 ^ (seed >> 32) as u32).set_octaves(self.octaves);
        let origin = *chunk.origin();
        let width = chunk.width();
        let outer = vs.max(NOISE_CELL);
        let cells = (width / outer) as usize + 1;
        let mut values = vec![0.0; cells * cells * cells];
        let index = |cx: usize, cy: usize, cz: usize| (cx * cells + cy) * cells + cz;
        for cx in 0..cells {
            for cy in 0..cells {
                for cz in 0..cells {
                    let [x, y, z] = [cx, cy, cz].map(|c| c as i32 * outer);
                    values[index(cx, cy, cz)] =
                        Self::cave_value(&noise, ctx, origin.x + x, origin.y + y, origin.z + z);
                }
            }
        }

        for cx in 0..cells - 1 {
            for cy in 0..cells - 1 {
                for cz in 0..cells - 1 {
                    let corner = |dx: usize, dy: usize, dz: usize| values[index(cx + dx, cy + dy, cz + dz)];
                    let corners = [
                        corner(0, 0, 0),
                        corner(0, 0, 1),
                        corner(0, 1, 0),
                        corner(0, 1, 1),
                        corner(1, 0, 0),
                        corner(1, 0, 1),
                        corner(1, 1, 0),
                        corner(1, 1, 1),
                    ];
                    if corners.iter().all(|&v| v <= 0.0) {
                        continue;
                    }
                    let [x0, y0, z0] = [cx, cy, cz].map(|c| c as i32 * outer);
                    let [v000, v001, v010, v011, v100, v101, v110, v111] = corners;
                    for dx in (0..outer).step_by(vs as usize) {
                        let ix = f64::from(dx) / f64::from(outer);
                        for dz in (0..outer).step_by(vs as usize) {
                            let iz = f64::from(dz) / f64::from(outer);
                            let lower = (1.0 - ix) * (1.0 - iz) * v000
                                + (1.0 - ix) * iz * v001
                                + ix * (1.0 - iz) * v100
                                + ix * iz * v101;
                            let upper = (1.0 - ix) * (1.0 - iz) * v010
                                + (1.0 - ix) * iz * v011
                                + ix * (1.0 - iz) * v110
                                + ix * iz * v111;
                            if lower <= 0.0 && upper <= 0.0 {
                                continue;
                            }
                            for dy in (0..outer).step_by(vs as usize) {
                                let iy = f64::from(dy) / f64::from(outer);
                                if (1.0 - iy) * lower + iy * upper > 0.0 {
                                    carve(chunk, x0 + dx, y0 + dy, z0 + dz)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
