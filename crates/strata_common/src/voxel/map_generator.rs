//! Surface map generation: terrain height and surface biome of every column.

use std::sync::Arc;

use bevy_math::DVec2;
use noise::{Fbm, MultiFractal, NoiseFn, SuperSimplex};
use rand::Rng;
use strata_schemas::voxel::biome::{pick_weighted, BiomeDefinition, BiomeRegistry};
use strata_schemas::voxel::map_fragment::{MapFragment, MapFragmentKey, MAP_SIZE};
use tracing::warn;

use crate::prelude::*;

/// Base-2 logarithm of [`BIOME_SIZE`].
pub const BIOME_SHIFT: i32 = 6;
/// Side length of a biome cell in blocks.
pub const BIOME_SIZE: i32 = 1 << BIOME_SHIFT;
const BIOME_SIZEF: f64 = BIOME_SIZE as f64;

/// Horizontal scale of the continents, in blocks.
const CONTINENT_SCALE: f64 = 2048.0;
/// Base height amplitude of the continents.
const CONTINENT_HEIGHT: f64 = 96.0;
/// Shifts the continents up so that land is a bit more common than ocean.
const CONTINENT_OFFSET: f64 = 12.0;
const ROUGHNESS_SCALE: f64 = 16.0;
const HILLS_SCALE: f64 = 96.0;
const MOUNTAINS_SCALE: f64 = 384.0;
/// Maximum displacement of biome borders, in blocks.
const BORDER_WARP: f64 = 24.0;

/// The jittered center point of one biome cell.
#[derive(Clone, Debug)]
struct BiomePoint {
    pos: DVec2,
    biome: Arc<BiomeDefinition>,
}

/// Generates [`MapFragment`]s; every column only depends on the seed and its world position.
#[derive(Clone, Debug)]
pub struct MapGenerator {
    seeder: RegionSeeder,
    surface_biomes: Vec<Arc<BiomeDefinition>>,
    continents: Fbm<SuperSimplex>,
    roughness: Fbm<SuperSimplex>,
    hills: Fbm<SuperSimplex>,
    mountains: Fbm<SuperSimplex>,
    warp: Fbm<SuperSimplex>,
}

fn fbm(seed: u64, salt: u64, octaves: usize) -> Fbm<SuperSimplex> {
    let seed = stage_seed(seed, salt);
    Fbm::<SuperSimplex>::new(seed as u32 ^ (seed >> 32) as u32).set_octaves(octaves)
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

impl MapGenerator {
    /// Prepares the noises of the given world seed; fails if the registry holds no surface biome.
    pub fn new(seed: u64, biomes: &BiomeRegistry) -> Result<Self> {
        let surface_biomes: Vec<_> = biomes
            .iter_ordered()
            .map(|(_, b)| b)
            .filter(|b| !b.is_cave() && b.has_valid_heights())
            .cloned()
            .collect();
        ensure!(!surface_biomes.is_empty(), "No surface biomes registered");
        Ok(Self {
            seeder: RegionSeeder::new(stage_seed(seed, 0x3f2c_4c0b_8a7d_11e5)),
            surface_biomes,
            continents: fbm(seed, 0x51, 6),
            roughness: fbm(seed, 0x52, 3),
            hills: fbm(seed, 0x53, 4),
            mountains: fbm(seed, 0x54, 5),
            warp: fbm(seed, 0x55, 2),
        })
    }

    /// Height of the continent at the world position, before any biome shaping.
    pub fn base_height(&self, wx: f64, wz: f64) -> f64 {
        self.continents.get([wx / CONTINENT_SCALE, wz / CONTINENT_SCALE]) * CONTINENT_HEIGHT + CONTINENT_OFFSET
    }

    fn biome_point(&self, cx: i32, cz: i32) -> BiomePoint {
        let mut rng = self.seeder.rng_at_column(cx, cz);
        let pos = DVec2::new(
            (f64::from(cx) + rng.gen::<f64>()) * BIOME_SIZEF,
            (f64::from(cz) + rng.gen::<f64>()) * BIOME_SIZEF,
        );
        let height = self.base_height(pos.x, pos.y).floor() as i32;
        let valid: Vec<_> = self
            .surface_biomes
            .iter()
            .filter(|b| b.valid_at(height))
            .cloned()
            .collect();
        let biome = match pick_weighted(&valid, |b| b.chance, &mut rng) {
            Some(biome) => biome.clone(),
            None => {
                let fallback = &self.surface_biomes[0];
                warn!(
                    "No surface biome is valid at height {height} (cell {cx}, {cz}), using {}",
                    fallback.name
                );
                fallback.clone()
            }
        };
        BiomePoint { pos, biome }
    }

    /// Surface height and biome of one world column.
    fn column(&self, wx: i32, wz: i32, points: &impl Fn(i32, i32) -> BiomePoint) -> (f32, Arc<BiomeDefinition>) {
        let (x, z) = (f64::from(wx), f64::from(wz));
        let (cx, cz) = (wx >> BIOME_SHIFT, wz >> BIOME_SHIFT);

        // Biome shape parameters blend smoothly between the four nearest cell centers.
        let (gx, gz) = (x / BIOME_SIZEF - 0.5, z / BIOME_SIZEF - 0.5);
        let (ix, iz) = (gx.floor() as i32, gz.floor() as i32);
        let (tx, tz) = (smoothstep(gx - gx.floor()), smoothstep(gz - gz.floor()));
        let mut shape = [0.0f64; 3];
        for (dx, dz, weight) in [
            (0, 0, (1.0 - tx) * (1.0 - tz)),
            (1, 0, tx * (1.0 - tz)),
            (0, 1, (1.0 - tx) * tz),
            (1, 1, tx * tz),
        ] {
            let biome = points(ix + dx, iz + dz).biome;
            shape[0] += weight * f64::from(biome.roughness);
            shape[1] += weight * f64::from(biome.hills);
            shape[2] += weight * f64::from(biome.mountains);
        }
        let [roughness, hills, mountains] = shape;
        let height = self.base_height(x, z)
            + roughness * self.roughness.get([x / ROUGHNESS_SCALE, z / ROUGHNESS_SCALE])
            + hills * self.hills.get([x / HILLS_SCALE, z / HILLS_SCALE])
            + mountains * (self.mountains.get([x / MOUNTAINS_SCALE, z / MOUNTAINS_SCALE]) + 1.0) / 2.0;

        // The column belongs to the nearest cell point, measured from a slightly displaced position.
        let warped = DVec2::new(
            x + BORDER_WARP * self.warp.get([x / BIOME_SIZEF, z / BIOME_SIZEF]),
            z + BORDER_WARP * self.warp.get([z / BIOME_SIZEF + 1000.0, x / BIOME_SIZEF]),
        );
        let mut nearest: Option<(f64, BiomePoint)> = None;
        for ncx in cx - 1..=cx + 1 {
            for ncz in cz - 1..=cz + 1 {
                let point = points(ncx, ncz);
                let dist = point.pos.distance_squared(warped);
                if nearest.as_ref().map_or(true, |(d, _)| dist < *d) {
                    nearest = Some((dist, point));
                }
            }
        }
        let biome = match nearest {
            Some((_, point)) => point.biome,
            None => points(cx, cz).biome,
        };
        (height as f32, biome)
    }

    /// Surface height and biome of a single world column.
    pub fn sample(&self, wx: i32, wz: i32) -> (f32, Arc<BiomeDefinition>) {
        self.column(wx, wz, &|cx, cz| self.biome_point(cx, cz))
    }

    /// Generates the fragment with the given key.
    pub fn generate_fragment(&self, key: MapFragmentKey) -> Result<MapFragment> {
        let vs = key.voxel_size;
        ensure!(
            vs > 0 && (vs as u32).is_power_of_two(),
            "Invalid map fragment voxel size {vs}"
        );
        ensure!(
            key == MapFragmentKey::containing(key.wx, key.wz, vs),
            "Map fragment origin ({}, {}) is not aligned to its width {}",
            key.wx,
            key.wz,
            key.width()
        );

        // Biome points are shared by many columns, so they are computed once per fragment.
        let cell_min = (key.wx >> BIOME_SHIFT) - 2;
        let cell_min_z = (key.wz >> BIOME_SHIFT) - 2;
        let cells = (key.width() >> BIOME_SHIFT).max(1) + 4;
        let mut cache: HashMap<(i32, i32), BiomePoint> = HashMap::with_capacity((cells * cells) as usize);
        let lookup_cells: Vec<_> = (0..cells)
            .flat_map(|i| (0..cells).map(move |j| (cell_min + i, cell_min_z + j)))
            .collect();
        for (cx, cz) in lookup_cells {
            cache.insert((cx, cz), self.biome_point(cx, cz));
        }
        let points = |cx: i32, cz: i32| match cache.get(&(cx, cz)) {
            Some(point) => point.clone(),
            None => self.biome_point(cx, cz),
        };

        let mut fragment = MapFragment::new(key, self.surface_biomes[0].clone());
        for rx in 0..MAP_SIZE {
            for rz in 0..MAP_SIZE {
                let (height, biome) = self.column(key.wx + rx * vs, key.wz + rz * vs, &points);
                fragment.set_column(rx, rz, height, biome);
            }
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::voxel::generator::test_util::registries;

    #[test]
    fn fragments_are_pure() {
        let registries = registries();
        let generator = MapGenerator::new(42, &registries.biomes).unwrap();
        let key = MapFragmentKey::containing(-300, 700, 1);
        let a = generator.generate_fragment(key).unwrap();
        let b = MapGenerator::new(42, &registries.biomes)
            .unwrap()
            .generate_fragment(key)
            .unwrap();
        for (wx, wz) in [(-256, 512), (-1, 767), (-100, 600)] {
            assert_eq!(a.get_height(wx, wz), b.get_height(wx, wz));
            assert_eq!(a.get_biome(wx, wz).name, b.get_biome(wx, wz).name);
            let (height, biome) = generator.sample(wx, wz);
            assert_eq!(a.get_height(wx, wz), height);
            assert_eq!(a.get_biome(wx, wz).name, biome.name);
        }
    }

    #[test]
    fn coarse_fragments_match_fine_columns() {
        let registries = registries();
        let generator = MapGenerator::new(7, &registries.biomes).unwrap();
        let fine = generator.generate_fragment(MapFragmentKey::containing(0, 0, 1)).unwrap();
        let coarse = generator.generate_fragment(MapFragmentKey::containing(0, 0, 8)).unwrap();
        for (wx, wz) in [(0, 0), (8, 248), (120, 64)] {
            assert_eq!(fine.get_height(wx, wz), coarse.get_height(wx, wz));
        }
    }

    #[test]
    fn seeds_change_the_terrain() {
        let registries = registries();
        let a = MapGenerator::new(1, &registries.biomes).unwrap();
        let b = MapGenerator::new(2, &registries.biomes).unwrap();
        let differs = (0..64).any(|i| a.sample(i * 97, i * 31).0 != b.sample(i * 97, i * 31).0);
        assert!(differs);
    }

    #[test]
    fn biomes_fit_their_cells() {
        let registries = registries();
        let generator = MapGenerator::new(99, &registries.biomes).unwrap();
        for cx in -8..8 {
            for cz in -8..8 {
                let point = generator.biome_point(cx, cz);
                assert!(!point.biome.is_cave());
                let height = generator.base_height(point.pos.x, point.pos.y).floor() as i32;
                assert!(point.biome.valid_at(height), "{} at {height}", point.biome.name);
            }
        }
    }

    #[test]
    fn rejects_unaligned_keys() {
        let registries = registries();
        let generator = MapGenerator::new(0, &registries.biomes).unwrap();
        let key = MapFragmentKey {
            wx: 3,
            wz: 0,
            voxel_size: 1,
        };
        assert!(generator.generate_fragment(key).is_err());
        assert!(MapGenerator::new(0, &BiomeRegistry::default()).is_err());
    }
}
