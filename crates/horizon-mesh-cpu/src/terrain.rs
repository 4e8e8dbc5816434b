//! LOD mesh construction from a padded corner window.
//!
//! The window is the `(width + 3)^2` grid produced by
//! `horizon_chunk::Neighborhood::padded_window`: window `(wx, wy)` holds the
//! corner at chunk-local `(wx - 1, wy - 1)`. Vertices are placed in chunk-local
//! space with the chunk centre at the origin, grid `x` along world `x` and
//! grid `y` (northwards) along world `z`.

use horizon_chunk::Corner;
use horizon_chunk::sampler::{CellHeights, splits_sw_ne};
use horizon_geom::{Aabb, Vec3};

use crate::MeshBuild;

/// Geometry parameters shared by every LOD of every chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodParams {
    pub chunk_width: usize,
    pub square_width: f32,
    pub height_step: f32,
    pub texture_repeats: f32,
}

/// One built level of detail, ready to be cached by its chunk.
#[derive(Clone, Debug)]
pub struct LodMesh {
    pub lod: u8,
    /// Terrain type whose material the mesh is drawn with.
    pub terrain: u8,
    pub mesh: MeshBuild,
    pub bbox: Aabb,
}

/// Corner spacing used for `lod`: every `2^lod`-th corner, never wider than
/// the chunk.
pub fn lod_step(lod: u8, chunk_width: usize) -> usize {
    let step = 1usize.checked_shl(u32::from(lod)).unwrap_or(usize::MAX);
    step.min(chunk_width).max(1)
}

/// Local corner coordinates sampled at `step`. Always starts at 0 and ends at
/// `width` so neighbouring chunks share their edge vertices.
pub fn grid_coords(width: usize, step: usize) -> Vec<usize> {
    let mut coords: Vec<usize> = (0..width).step_by(step).collect();
    coords.push(width);
    coords
}

struct Window<'a> {
    corners: &'a [Corner],
    row: usize,
    base: i32,
    height_step: f32,
}

impl Window<'_> {
    /// World height of the corner at chunk-local `(x, y)`, both in `-1..=width + 1`.
    #[inline]
    fn height(&self, x: isize, y: isize) -> f32 {
        let i = (x + 1) as usize + (y + 1) as usize * self.row;
        (i32::from(self.corners[i].height) - self.base) as f32 * self.height_step
    }

    fn normal(&self, x: usize, y: usize, square_width: f32) -> Vec3 {
        let (x, y) = (x as isize, y as isize);
        let dx = self.height(x + 1, y) - self.height(x - 1, y);
        let dz = self.height(x, y + 1) - self.height(x, y - 1);
        Vec3::new(-dx, 2.0 * square_width, -dz).normalized()
    }
}

/// Builds the mesh for `lod`. Heights are taken relative to `base_height`;
/// skirts hang from every edge down to `lowest_height` to hide cracks between
/// chunks drawn at different levels.
pub fn build_lod_mesh(
    window: &[Corner],
    lod: u8,
    base_height: i32,
    lowest_height: u16,
    terrain: u8,
    params: &LodParams,
) -> LodMesh {
    let w = params.chunk_width;
    debug_assert_eq!(window.len(), (w + 3) * (w + 3));
    let sq = params.square_width;
    let half = w as f32 * sq * 0.5;
    let win = Window {
        corners: window,
        row: w + 3,
        base: base_height,
        height_step: params.height_step,
    };

    let coords = grid_coords(w, lod_step(lod, w));
    let n = coords.len();
    let mut mesh = MeshBuild::default();
    mesh.reserve(n * n + 8 * n, 2 * (n - 1) * (n - 1) + 16 * n);

    for &y in &coords {
        for &x in &coords {
            let h = win.height(x as isize, y as isize);
            let p = Vec3::new(x as f32 * sq - half, h, y as f32 * sq - half);
            let uv = (
                x as f32 / w as f32 * params.texture_repeats,
                y as f32 / w as f32 * params.texture_repeats,
            );
            mesh.push_vertex(p, win.normal(x, y, sq), uv);
        }
    }

    let vi = |i: usize, j: usize| (i + j * n) as u32;
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let (sw, se, ne, nw) = (vi(i, j), vi(i + 1, j), vi(i + 1, j + 1), vi(i, j + 1));
            let cell = CellHeights {
                sw: mesh.position(sw).y,
                se: mesh.position(se).y,
                ne: mesh.position(ne).y,
                nw: mesh.position(nw).y,
            };
            if splits_sw_ne(&cell) {
                mesh.push_triangle(sw, ne, se);
                mesh.push_triangle(sw, nw, ne);
            } else {
                mesh.push_triangle(nw, se, sw);
                mesh.push_triangle(nw, ne, se);
            }
        }
    }

    let bottom = (i32::from(lowest_height) - base_height) as f32 * params.height_step;
    let edges: [(Vec<u32>, Vec3); 4] = [
        ((0..n).map(|i| vi(i, 0)).collect(), Vec3::new(0.0, 0.0, -1.0)),
        ((0..n).map(|i| vi(i, n - 1)).collect(), Vec3::new(0.0, 0.0, 1.0)),
        ((0..n).map(|j| vi(0, j)).collect(), Vec3::new(-1.0, 0.0, 0.0)),
        ((0..n).map(|j| vi(n - 1, j)).collect(), Vec3::new(1.0, 0.0, 0.0)),
    ];
    for (edge, outward) in &edges {
        add_skirt(&mut mesh, edge, bottom, *outward);
    }

    let bbox = mesh.bbox();
    LodMesh {
        lod,
        terrain,
        mesh,
        bbox,
    }
}

fn add_skirt(mesh: &mut MeshBuild, edge: &[u32], bottom: f32, outward: Vec3) {
    // Drop a copy of each edge vertex to the bottom height; faces that would
    // have zero height are skipped.
    let lowered: Vec<Option<u32>> = edge
        .iter()
        .map(|&top| {
            let p = mesh.position(top);
            if p.y > bottom {
                let o = top as usize * 2;
                let uv = (mesh.uv[o], mesh.uv[o + 1]);
                let n = mesh.normal(top);
                Some(mesh.push_vertex(Vec3::new(p.x, bottom, p.z), n, uv))
            } else {
                None
            }
        })
        .collect();

    for k in 0..edge.len() - 1 {
        let (a, b) = (edge[k], edge[k + 1]);
        match (lowered[k], lowered[k + 1]) {
            (Some(la), Some(lb)) => {
                mesh.push_triangle_facing(a, b, lb, outward);
                mesh.push_triangle_facing(a, lb, la, outward);
            }
            (Some(la), None) => mesh.push_triangle_facing(a, b, la, outward),
            (None, Some(lb)) => mesh.push_triangle_facing(a, b, lb, outward),
            (None, None) => {}
        }
    }
}
