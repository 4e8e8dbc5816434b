//! Procedural undergrowth scatter over one chunk.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use horizon_chunk::Corner;
use horizon_chunk::sampler::{CellHeights, height_from_corners, locate_cell, normal_from_corners};
use horizon_geom::{ChunkPos, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How one kind of decoration is scattered over corners of one terrain type.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementRule {
    pub terrain: u8,
    /// Instances per square world unit before the noise mask is applied.
    pub density: f32,
    pub follow_ground_angle: bool,
    pub min_scale: f32,
    pub max_scale: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementParams {
    pub chunk_width: usize,
    pub square_width: f32,
    pub height_step: f32,
    pub seed: u64,
    /// Frequency of the clumping noise, per world unit.
    pub noise_frequency: f32,
    pub rules: Vec<PlacementRule>,
}

/// One placed instance in chunk-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    /// Rotation around the instance's up axis, radians.
    pub yaw: f32,
    pub up: Vec3,
    pub scale: f32,
    /// Index of the rule (and so the model) that produced this instance.
    pub rule: usize,
}

fn chunk_seed(seed: u64, pos: ChunkPos) -> u64 {
    let x = u64::from(pos.x as u32);
    let y = u64::from(pos.y as u32);
    seed ^ x.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ y.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}

/// Scatters instances over the chunk at `pos`. `window` is the padded corner
/// window of the chunk; heights are relative to `base_height`.
///
/// The result depends only on the inputs, so a chunk that is destroyed and
/// recreated gets the same decoration back.
pub fn place_undergrowth(
    pos: ChunkPos,
    window: &[Corner],
    base_height: i32,
    params: &PlacementParams,
) -> Vec<Placement> {
    let w = params.chunk_width;
    debug_assert_eq!(window.len(), (w + 3) * (w + 3));
    let row = w + 3;
    let sq = params.square_width;
    let size = w as f32 * sq;
    let half = size * 0.5;
    if half <= 0.0 {
        return Vec::new();
    }
    let corner = |x: usize, y: usize| window[(x + 1) + (y + 1) * row];
    let height = |x: usize, y: usize| {
        (i32::from(corner(x, y).height) - base_height) as f32 * params.height_step
    };

    let mut rng = StdRng::seed_from_u64(chunk_seed(params.seed, pos));
    let mut noise = FastNoiseLite::with_seed(params.seed as i32);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(params.noise_frequency));

    let mut out = Vec::new();
    for (rule_idx, rule) in params.rules.iter().enumerate() {
        let expected = (rule.density * size * size).max(0.0);
        let mut count = expected.floor() as usize;
        if rng.random::<f32>() < expected.fract() {
            count += 1;
        }
        for _ in 0..count {
            let x = rng.random_range(-half..half);
            let z = rng.random_range(-half..half);
            let yaw = rng.random_range(0.0..std::f32::consts::TAU);
            let scale = if rule.max_scale > rule.min_scale {
                rng.random_range(rule.min_scale..rule.max_scale)
            } else {
                rule.min_scale
            };
            let keep = rng.random::<f32>();

            let (ix, iy, f) = locate_cell(Vec2::new(x, z), w, sq);
            let nearest = corner(ix + (f.x >= 0.5) as usize, iy + (f.y >= 0.5) as usize);
            if nearest.terrain != rule.terrain {
                continue;
            }
            let wx = pos.x as f32 * size + x;
            let wz = pos.y as f32 * size + z;
            let mask = ((noise.get_noise_2d(wx, wz) + 1.0) * 0.5).clamp(0.0, 1.0);
            if keep > mask {
                continue;
            }

            let cell = CellHeights {
                sw: height(ix, iy),
                se: height(ix + 1, iy),
                ne: height(ix + 1, iy + 1),
                nw: height(ix, iy + 1),
            };
            let up = if rule.follow_ground_angle {
                normal_from_corners(&cell, f, sq)
            } else {
                Vec3::UP
            };
            out.push(Placement {
                position: Vec3::new(x, height_from_corners(&cell, f), z),
                yaw,
                up,
                scale,
                rule: rule_idx,
            });
        }
    }
    log::trace!(target: "undergrowth", "placed {} instances on {}", out.len(), pos);
    out
}
