//! A fixed, tiling pattern of well spaced points used to scatter surface structures at fine detail levels.
//!
//! The world plane is split into [`FEATURE_SIZE`]² feature cells, each holding exactly one point. A point sits at
//! an offset of `0..8` blocks on each axis from its cell corner, and no two points are closer than
//! `sqrt(MIN_DISTANCE_SQUARED)` blocks. The pattern repeats every `PATTERN_CELLS * FEATURE_SIZE` blocks.

use rand::Rng;
use strata_schemas::rng::rng_from_seed;

use crate::prelude::*;

/// Side of a feature cell in blocks.
pub const FEATURE_SIZE: i32 = 1 << FEATURE_SHIFT;
const FEATURE_SHIFT: i32 = 2;
/// Number of full resolution columns one pattern point stands for.
pub const FEATURE_AREA: i32 = FEATURE_SIZE * FEATURE_SIZE;

const PATTERN_SHIFT: i32 = 8;
const PATTERN_CELLS: i32 = 1 << PATTERN_SHIFT;
const PATTERN_MASK: i32 = PATTERN_CELLS - 1;
const MIN_DISTANCE_SQUARED: i32 = 8;
/// Offsets reach 7 blocks, so only cells up to two cells away can hold a conflicting point.
const NEIGHBOURHOOD: i32 = 2;
const PASSES: usize = 4;
const ATTEMPTS: usize = 16;
const PATTERN_SEED: u64 = 54095248685739;

/// Offset byte of one cell: x in bits 3..6, z in bits 0..3.
#[inline]
fn offsets(cell: u8) -> (i32, i32) {
    (i32::from((cell >> 3) & 7), i32::from(cell & 7))
}

#[inline]
fn index(cx: i32, cz: i32) -> usize {
    (((cx & PATTERN_MASK) << PATTERN_SHIFT) | (cz & PATTERN_MASK)) as usize
}

fn fits(pattern: &[u8], cx: i32, cz: i32, candidate: u8) -> bool {
    let (ox, oz) = offsets(candidate);
    for dx in -NEIGHBOURHOOD..=NEIGHBOURHOOD {
        for dz in -NEIGHBOURHOOD..=NEIGHBOURHOOD {
            if dx == 0 && dz == 0 {
                continue;
            }
            let (nx, nz) = offsets(pattern[index(cx + dx, cz + dz)]);
            let ddx = nx + (dx << FEATURE_SHIFT) - ox;
            let ddz = nz + (dz << FEATURE_SHIFT) - oz;
            if ddx * ddx + ddz * ddz < MIN_DISTANCE_SQUARED {
                return false;
            }
        }
    }
    true
}

/// Jitters every point a few times, keeping only moves that respect the minimum distance.
///
/// The all-zero start is a regular grid that already respects it, so the pattern stays valid after every move.
fn generate_pattern() -> Box<[u8]> {
    let mut pattern = vec![0u8; (PATTERN_CELLS * PATTERN_CELLS) as usize].into_boxed_slice();
    let mut rng = rng_from_seed(PATTERN_SEED);
    for _ in 0..PASSES {
        for cx in 0..PATTERN_CELLS {
            for cz in 0..PATTERN_CELLS {
                for _ in 0..ATTEMPTS {
                    let candidate: u8 = rng.gen_range(0..64);
                    if fits(&pattern, cx, cz, candidate) {
                        pattern[index(cx, cz)] = candidate;
                        break;
                    }
                }
            }
        }
    }
    pattern
}

fn pattern() -> &'static [u8] {
    static PATTERN: OnceLock<Box<[u8]>> = OnceLock::new();
    PATTERN.get_or_init(generate_pattern)
}

/// The pattern points inside the world rectangle `[x, x + width) × [z, z + depth)`, in world coordinates.
pub fn points_in(x: i32, z: i32, width: i32, depth: i32) -> impl Iterator<Item = (i32, i32)> {
    let pattern = pattern();
    let reach = 2 * FEATURE_SIZE - 1;
    let cells_x = ((x - reach) >> FEATURE_SHIFT)..=((x + width - 1) >> FEATURE_SHIFT);
    let cells_z = ((z - reach) >> FEATURE_SHIFT)..=((z + depth - 1) >> FEATURE_SHIFT);
    cells_x
        .flat_map(move |cx| cells_z.clone().map(move |cz| (cx, cz)))
        .map(move |(cx, cz)| {
            let (ox, oz) = offsets(pattern[index(cx, cz)]);
            ((cx << FEATURE_SHIFT) + ox, (cz << FEATURE_SHIFT) + oz)
        })
        .filter(move |&(px, pz)| px >= x && px < x + width && pz >= z && pz < z + depth)
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn one_point_per_cell_over_a_period() {
        let period = PATTERN_CELLS * FEATURE_SIZE;
        assert_eq!(
            points_in(-37, 11, period, period).count(),
            (PATTERN_CELLS * PATTERN_CELLS) as usize
        );
    }

    #[test]
    fn points_keep_their_distance() {
        let points: HashSet<(i32, i32)> = points_in(-100, -100, 200, 200).collect();
        assert!(points.len() > 200 * 200 / FEATURE_AREA as usize / 2);
        for &(x, z) in &points {
            for dx in -2..=2 {
                for dz in -2..=2 {
                    if (dx, dz) != (0, 0) && dx * dx + dz * dz < MIN_DISTANCE_SQUARED {
                        assert!(!points.contains(&(x + dx, z + dz)), "({x}, {z}) crowds ({dx}, {dz})");
                    }
                }
            }
        }
    }

    #[quickcheck]
    fn overlapping_windows_agree(x: i16, z: i16, shift: u8) -> bool {
        let (x, z) = (i32::from(x), i32::from(z));
        let shift = i32::from(shift % 32);
        let whole: HashSet<(i32, i32)> = points_in(x, z, 64, 64).collect();
        let part: HashSet<(i32, i32)> = points_in(x + shift, z + shift, 64 - shift, 64 - shift).collect();
        let clipped: HashSet<(i32, i32)> = whole
            .iter()
            .copied()
            .filter(|&(px, pz)| px >= x + shift && pz >= z + shift)
            .collect();
        part == clipped
    }
}
