//! Deep caverns lined with glowing crystals.

use std::f64::consts::{PI, TAU};

use bevy_math::DVec3;
use rand::Rng;
use smallvec::SmallVec;
use strata_schemas::registries::WorldRegistries;
use strata_schemas::registry::RegistryName;
use strata_schemas::rng::{rng_from_seed, GenRng};
use strata_schemas::voxel::chunk::Chunk;
use strata_schemas::voxel::voxeltypes::BlockEntry;

use super::{GenerationContext, GeneratorStage};
use crate::prelude::*;
use crate::voxel::blocks::{glow_crystal_name, GLOW_CRYSTAL_COLORS, ICE_BLOCK_NAME};

/// Registry name of [`CrystalCavernStage`].
pub const CRYSTAL_CAVERN_STAGE_NAME: RegistryName = RegistryName::strata_const("crystal_cavern");

const CELL_SIZE: i32 = 256;
const CELL_SHIFT: i32 = 8;
const RANGE: i32 = 3;
/// Caverns never start above this height.
const MAX_CAVERN_Y: f64 = -128.0;
/// Crystals are grown from spawn points at most this far outside the chunk.
const CRYSTAL_REACH: f64 = 32.0;
const MAX_CRYSTAL_SPAWNS: usize = 2048;

/// Carves winding caverns below y = -128 and grows crystal spikes from their walls.
#[derive(Clone, Debug)]
pub struct CrystalCavernStage {
    crystals: Vec<BlockEntry>,
    ice: BlockEntry,
}

impl CrystalCavernStage {
    /// Resolves the crystal blocks of every colour.
    pub fn new(registries: &WorldRegistries) -> Result<Self> {
        let crystals = GLOW_CRYSTAL_COLORS
            .iter()
            .map(|(color, _)| registries.block(&glow_crystal_name(color)))
            .collect::<Result<Vec<_>, _>>()?;
        ensure!(!crystals.is_empty(), "No glow crystal blocks available");
        Ok(Self {
            crystals,
            ice: registries.block(&ICE_BLOCK_NAME)?,
        })
    }
}

/// State of one cavern walk through the chunk.
struct Cavern<'c> {
    chunk: &'c mut Chunk,
    origin: DVec3,
    width: f64,
    ice: BlockEntry,
}

impl Cavern<'_> {
    fn center(&self) -> DVec3 {
        self.origin + DVec3::splat(self.width / 2.0)
    }

    /// Removes the ellipsoid around `pos`, keeping fluids and ice.
    fn carve_ellipsoid(&mut self, pos: DVec3, xz_scale: f64, y_scale: f64) -> Result<()> {
        let vs = self.chunk.voxel_size();
        let width = self.chunk.width();
        let rel = pos - self.origin;
        let x_min = self.chunk.start_index(((rel.x - xz_scale) as i32 - 1).max(0));
        let x_max = ((rel.x + xz_scale) as i32 + 1).min(width);
        let y_min = self.chunk.start_index(((rel.y - y_scale) as i32 - 1).max(0));
        let y_max = ((rel.y + y_scale) as i32 + 1).min(width);
        let z_min = self.chunk.start_index(((rel.z - xz_scale) as i32 - 1).max(0));
        let z_max = ((rel.z + xz_scale) as i32 + 1).min(width);
        for x in (x_min..x_max).step_by(vs as usize) {
            let dx = (f64::from(x) - rel.x) / xz_scale;
            for z in (z_min..z_max).step_by(vs as usize) {
                let dz = (f64::from(z) - rel.z) / xz_scale;
                if dx * dx + dz * dz >= 1.0 {
                    continue;
                }
                for y in (y_min..y_max).step_by(vs as usize) {
                    let dy = (f64::from(y) - rel.y) / y_scale;
                    if dx * dx + dy * dy + dz * dz >= 1.0 {
                        continue;
                    }
                    let old = self.chunk.get_block(x, y, z)?;
                    let keep = old == self.ice || old.lookup(self.chunk.block_registry()).is_some_and(|def| def.fluid);
                    if !old.is_empty() && !keep {
                        self.chunk.update_block_in_generation(x, y, z, BlockEntry::EMPTY)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Walks a cavern from `pos`, carving it and recording crystal spawn points on its walls.
    fn walk(&mut self, seed: u64, mut pos: DVec3, size: f64, mut direction: f64, mut slope: f64) -> Result<Vec<DVec3>> {
        let mut rng = rng_from_seed(seed);
        let mut spawns = Vec::new();
        let reach = f64::from((RANGE - 1) * CELL_SIZE);
        let length = reach - rng.gen_range(0.0..reach / 4.0);
        let high_slope = rng.gen_range(0..6) == 0;
        let (mut direction_change, mut slope_change) = (0.0, 0.0);
        let center = self.center();
        let half = self.width / 2.0;

        let mut step = 0.0;
        while step < length {
            let xz_scale = 6.0 + (step * PI / length).sin() * size;
            let y_scale = xz_scale * 0.75;
            let forward = DVec3::new(direction.cos() * slope.cos(), slope.sin(), direction.sin() * slope.cos());
            pos += forward;

            slope *= if high_slope { 0.92 } else { 0.7 };
            slope += slope_change * 0.01;
            direction += direction_change * 0.01;
            slope_change *= 0.9;
            direction_change *= 0.75;
            slope_change += (rng.gen::<f64>() - rng.gen::<f64>()) * rng.gen::<f64>() * 2.0;
            direction_change += (rng.gen::<f64>() - rng.gen::<f64>()) * rng.gen::<f64>() * 4.0;

            let delta = pos - center;
            let steps_left = length - step;
            let max_length = size + 8.0;
            // Too far away to ever reach the chunk again.
            if delta.x * delta.x + delta.z * delta.z - steps_left * steps_left > max_length * max_length {
                break;
            }
            if delta.x.abs() <= half + xz_scale && delta.z.abs() <= half + xz_scale {
                self.carve_ellipsoid(pos, xz_scale, y_scale)?;
            }

            let spawn_seed: u64 = rng.gen();
            if (delta.abs() - DVec3::splat(half + CRYSTAL_REACH)).max_element() <= 0.0 {
                let mut spawn_rng = rng_from_seed(spawn_seed);
                let amount = (1.0 + 20.0 * xz_scale * y_scale / size / size) as usize;
                for _ in 0..amount {
                    let normal = random_direction(&mut spawn_rng);
                    // Only points where the wall is parallel to the walking direction.
                    if normal.dot(forward).abs() < 0.05 && spawns.len() < MAX_CRYSTAL_SPAWNS {
                        spawns.push(pos + normal * DVec3::new(xz_scale, y_scale, xz_scale));
                    }
                }
            }
            step += 1.0;
        }
        Ok(spawns)
    }

    /// Grows a cluster of crystal spikes from `spawn`.
    fn grow_crystal(&mut self, spawn: DVec3, seed: u64, needles: bool, block: BlockEntry) -> Result<()> {
        let rel = spawn.floor() - self.origin;
        let vs = self.chunk.voxel_size();
        let width = self.chunk.width();
        if (rel.min_element() < -CRYSTAL_REACH) || rel.max_element() > self.width + CRYSTAL_REACH {
            return Ok(());
        }
        let mut rng = rng_from_seed(seed);
        let base = if needles { 5 } else { 4 };
        let spikes = base + rng.gen_range(0..base);
        for _ in 0..spikes {
            let length = f64::from(rng.gen_range(8..32));
            let dir = random_direction(&mut rng);
            let mut j = 0.0;
            while j < length {
                let p = rel + dir * j;
                let mut size = if needles {
                    0.7
                } else {
                    12.0 * (length - j) / length / f64::from(spikes)
                };
                let lo = (p - DVec3::splat(size)).floor().as_ivec3();
                let hi = (p + DVec3::splat(size)).floor().as_ivec3();
                for x in self.chunk.start_index(lo.x.max(0))..=hi.x.min(width - 1) {
                    if x & (vs - 1) != 0 {
                        continue;
                    }
                    for y in self.chunk.start_index(lo.y.max(0))..=hi.y.min(width - 1) {
                        if y & (vs - 1) != 0 {
                            continue;
                        }
                        for z in self.chunk.start_index(lo.z.max(0))..=hi.z.min(width - 1) {
                            if z & (vs - 1) != 0 {
                                continue;
                            }
                            let d = DVec3::new(f64::from(x), f64::from(y), f64::from(z)) - p;
                            if d.length_squared() > size * size {
                                continue;
                            }
                            let old = self.chunk.get_block(x, y, z)?;
                            let replaceable = self.chunk.is_degradable(old)
                                || old.lookup(self.chunk.block_registry()).is_some_and(|def| def.fluid);
                            if replaceable {
                                self.chunk.update_block_in_generation(x, y, z, block)?;
                            }
                        }
                    }
                }
                size = size.min(2.0);
                // Keep the spike connected.
                j += size / 2.0;
                if size < 0.5 {
                    break;
                }
            }
        }
        Ok(())
    }
}

fn random_direction(rng: &mut GenRng) -> DVec3 {
    let theta = TAU * rng.gen::<f64>();
    let phi = (1.0 - 2.0 * rng.gen::<f64>()).acos();
    DVec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
}

impl GeneratorStage for CrystalCavernStage {
    fn registry_name(&self) -> RegistryName {
        CRYSTAL_CAVERN_STAGE_NAME
    }

    fn priority(&self) -> i32 {
        65537
    }

    fn generator_seed(&self) -> u64 {
        0x9b450ffb0d415317
    }

    fn generate(&self, seed: u64, chunk: &mut Chunk, _ctx: &GenerationContext) -> Result<()> {
        if chunk.voxel_size() > 2 {
            return Ok(());
        }
        let seeder = RegionSeeder::new(seed);
        let origin = *chunk.origin();
        let cell = origin >> CELL_SHIFT;
        let size = chunk.width() / CELL_SIZE;
        let mut cavern = Cavern {
            origin: origin.as_dvec3(),
            width: f64::from(chunk.width()),
            ice: self.ice,
            chunk,
        };
        // Caverns never reach above the chunks their cells are far away from.
        if cavern.origin.y > MAX_CAVERN_Y + f64::from((RANGE + 1) * CELL_SIZE) {
            return Ok(());
        }
        for x in cell.x - RANGE..=cell.x + size + RANGE {
            for y in cell.y - RANGE..=cell.y + size + RANGE {
                for z in cell.z - RANGE..=cell.z + size + RANGE {
                    self.consider_cell(&mut cavern, seeder.rng_at(x, y, z), x, y, z)?;
                }
            }
        }
        Ok(())
    }
}

/// Odds that the cell at the given cell height holds a cavern.
/// More caverns further down, saturating at a depth of 2048 blocks.
fn cavern_chance(cell_y: i32) -> f64 {
    let depth = -f64::from(cell_y) * f64::from(CELL_SIZE);
    (0.33 + 0.33 * depth / 1024.0).clamp(0.0, 0.99)
}

impl CrystalCavernStage {
    fn consider_cell(&self, cavern: &mut Cavern, mut rng: GenRng, x: i32, y: i32, z: i32) -> Result<()> {
        if rng.gen::<f64>() > cavern_chance(y) {
            return Ok(());
        }
        let start = DVec3::new(
            (f64::from(x) + rng.gen::<f64>()) * f64::from(CELL_SIZE),
            (f64::from(y) + rng.gen::<f64>()) * f64::from(CELL_SIZE),
            (f64::from(z) + rng.gen::<f64>()) * f64::from(CELL_SIZE),
        );
        if start.y > MAX_CAVERN_Y {
            return Ok(());
        }
        let direction = rng.gen::<f64>() * TAU;
        let slope = (rng.gen::<f64>() - 0.5) / 4.0;
        let size = rng.gen::<f64>() * 20.0 + 20.0;
        let multipliers: [u64; 3] = [rng.gen::<u64>() | 1, rng.gen::<u64>() | 1, rng.gen::<u64>() | 1];
        let needles = rng.gen::<bool>();
        let spawns = cavern.walk(rng.gen(), start, size, direction, slope)?;

        // A quarter of the caverns have more than one colour, with exponentially decreasing odds per colour.
        let mut colors = 1;
        if rng.gen::<bool>() {
            while rng.gen::<bool>() && colors < 32 {
                colors += 1;
            }
        }
        let palette: SmallVec<[BlockEntry; 4]> = (0..colors)
            .map(|_| self.crystals[rng.gen_range(0..self.crystals.len())])
            .collect();

        for spawn in spawns {
            let cell = spawn.floor().as_i64vec3();
            let crystal_seed = (cell.x as u64).wrapping_mul(multipliers[0])
                ^ (cell.y as u64).wrapping_mul(multipliers[1])
                ^ (cell.z as u64).wrapping_mul(multipliers[2]);
            let mut pick = rng_from_seed(crystal_seed);
            let block = palette[pick.gen_range(0..palette.len())];
            cavern.grow_crystal(spawn, pick.gen(), needles, block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use bevy_math::IVec3;

    use super::*;
    use crate::voxel::generator::test_util::*;

    fn stone_chunk(registries: &WorldRegistries, origin: IVec3, vs: i32) -> Chunk {
        let stone = registries.block_entry("stone").unwrap();
        let mut chunk = chunk_at(registries, origin, vs);
        let width = chunk.width();
        for x in (0..width).step_by(vs as usize) {
            for y in (0..width).step_by(vs as usize) {
                for z in (0..width).step_by(vs as usize) {
                    chunk.update_block_in_generation(x, y, z, stone).unwrap();
                }
            }
        }
        chunk
    }

    #[test]
    fn resolves_all_colours() {
        let registries = registries();
        let stage = CrystalCavernStage::new(&registries).unwrap();
        assert_eq!(stage.crystals.len(), GLOW_CRYSTAL_COLORS.len());
        let bare = WorldRegistries::default();
        assert!(CrystalCavernStage::new(&bare).is_err());
    }

    #[test]
    fn surface_and_coarse_chunks_are_untouched() {
        let registries = registries();
        let stage = CrystalCavernStage::new(&registries).unwrap();
        for (origin, vs) in [(IVec3::new(0, 1024, 0), 1), (IVec3::new(0, -2048, 0), 4)] {
            let chunk = stone_chunk(&registries, origin, vs);
            let ctx = flat_context(&registries, chunk.position(), 0.0);
            let mut generated = chunk.clone();
            stage.generate(3, &mut generated, &ctx).unwrap();
            assert_eq!(chunk, generated);
        }
    }

    #[test]
    fn deep_chunks_repeat() {
        let registries = registries();
        let stage = CrystalCavernStage::new(&registries).unwrap();
        let chunk = stone_chunk(&registries, IVec3::new(0, -640, 0), 2);
        let ctx = flat_context(&registries, chunk.position(), 0.0);
        let (mut a, mut b) = (chunk.clone(), chunk);
        stage.generate(12, &mut a, &ctx).unwrap();
        stage.generate(12, &mut b, &ctx).unwrap();
        assert_eq!(a, b);
        let stone = registries.block_entry("stone").unwrap();
        let crystals: usize = stage.crystals.iter().map(|&c| a.count_blocks(c)).sum();
        assert_eq!(
            a.count_blocks(stone) + a.count_blocks(BlockEntry::EMPTY) + crystals,
            32 * 32 * 32
        );
    }

    #[test]
    fn cavern_odds_saturate_with_depth() {
        let cell = |depth: i32| -depth / CELL_SIZE;
        assert!((cavern_chance(0) - 0.33).abs() < 1e-9);
        assert!(cavern_chance(cell(1024)) > cavern_chance(cell(512)));
        assert!((cavern_chance(cell(2048)) - 0.99).abs() < 1e-9);
        assert!((cavern_chance(cell(2048)) - cavern_chance(cell(1 << 20))).abs() < 1e-9);
        assert_eq!(cavern_chance(i32::MIN / CELL_SIZE), 0.99);
        assert_eq!(cavern_chance(cell(-1024)), 0.0);
    }

    #[test]
    fn directions_are_unit_vectors() {
        let mut rng = rng_from_seed(4);
        for _ in 0..100 {
            assert!((random_direction(&mut rng).length() - 1.0).abs() < 1e-9);
        }
    }
}
