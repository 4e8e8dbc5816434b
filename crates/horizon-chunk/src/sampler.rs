//! Height and normal sampling inside one grid cell.
//!
//! Each cell is split into two triangles along the diagonal whose end
//! heights differ the least. The mesh builder uses [`splits_sw_ne`] for the
//! same decision, so sampled heights lie exactly on the rendered surface.

use horizon_geom::{Vec2, Vec3};

/// Heights of a cell's corners in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellHeights {
    pub sw: f32,
    pub se: f32,
    pub ne: f32,
    pub nw: f32,
}

/// True when the cell is split along the south-west to north-east diagonal.
#[inline]
pub fn splits_sw_ne(c: &CellHeights) -> bool {
    (c.sw - c.ne).abs() < (c.se - c.nw).abs()
}

/// Height at fractional position `f` (both axes in `0..=1`, `y` northwards).
pub fn height_from_corners(c: &CellHeights, f: Vec2) -> f32 {
    if splits_sw_ne(c) {
        if f.x > f.y {
            // South-east triangle: SW, SE, NE
            c.sw + (c.se - c.sw) * f.x + (c.ne - c.se) * f.y
        } else {
            // North-west triangle: SW, NE, NW
            c.sw + (c.ne - c.nw) * f.x + (c.nw - c.sw) * f.y
        }
    } else if f.x + f.y < 1.0 {
        // South-west triangle: SW, SE, NW
        c.sw + (c.se - c.sw) * f.x + (c.nw - c.sw) * f.y
    } else {
        // North-east triangle: SE, NE, NW
        c.ne + (c.ne - c.nw) * (f.x - 1.0) + (c.ne - c.se) * (f.y - 1.0)
    }
}

/// Face normal of the triangle containing `f`. `square_width` is the cell
/// edge length in world units; grid `y` maps to world `z`.
pub fn normal_from_corners(c: &CellHeights, f: Vec2, square_width: f32) -> Vec3 {
    let w = square_width;
    let (a, b) = if splits_sw_ne(c) {
        if f.x > f.y {
            (
                Vec3::new(w, c.ne - c.sw, w),
                Vec3::new(w, c.se - c.sw, 0.0),
            )
        } else {
            (
                Vec3::new(0.0, c.nw - c.sw, w),
                Vec3::new(w, c.ne - c.sw, w),
            )
        }
    } else if f.x + f.y < 1.0 {
        (
            Vec3::new(w, c.se - c.nw, -w),
            Vec3::new(0.0, c.sw - c.nw, -w),
        )
    } else {
        (
            Vec3::new(w, c.ne - c.nw, 0.0),
            Vec3::new(w, c.se - c.nw, -w),
        )
    };
    let normal = a.cross(b).normalized();
    debug_assert!(normal.y > 0.0);
    normal
}

/// Splits a position local to a chunk (origin at the chunk centre, world
/// units) into a cell index and the fraction within that cell. Positions
/// outside the chunk clamp to its edge cells.
pub fn locate_cell(pos: Vec2, chunk_width: usize, square_width: f32) -> (usize, usize, Vec2) {
    let half = chunk_width as f32 * square_width * 0.5;
    let mx = (pos.x + half) / square_width;
    let my = (pos.y + half) / square_width;
    let max_i = chunk_width as i64 - 1;
    let ix = (mx.floor() as i64).clamp(0, max_i) as usize;
    let iy = (my.floor() as i64).clamp(0, max_i) as usize;
    let fx = (mx - ix as f32).clamp(0.0, 1.0);
    let fy = (my - iy as f32).clamp(0.0, 1.0);
    (ix, iy, Vec2::new(fx, fy))
}
