use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use horizon_chunk::{Corner, HeightField};
use horizon_geom::ChunkPos;

/// Procedural corner source: fractal noise remapped onto the `u16` height
/// range, with terrain types banded by height.
pub struct HeightGen {
    terrain: FastNoiseLite,
    detail: FastNoiseLite,
    chunk_width: usize,
    sea_level: u16,
    amplitude: f32,
}

impl HeightGen {
    pub fn new(seed: i32, chunk_width: usize, sea_level: u16, amplitude: f32) -> Self {
        let mut terrain = FastNoiseLite::with_seed(seed);
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_fractal_type(Some(FractalType::FBm));
        terrain.set_fractal_octaves(Some(4));
        terrain.set_frequency(Some(0.004));
        let mut detail = FastNoiseLite::with_seed(seed ^ 99_173);
        detail.set_noise_type(Some(NoiseType::OpenSimplex2));
        detail.set_frequency(Some(0.05));
        Self {
            terrain,
            detail,
            chunk_width,
            sea_level,
            amplitude,
        }
    }

    pub fn sea_level(&self) -> u16 {
        self.sea_level
    }

    /// Corner at global corner coordinates `(gx, gy)`.
    pub fn corner(&self, gx: i32, gy: i32) -> Corner {
        let (x, y) = (gx as f32, gy as f32);
        let n = self.terrain.get_noise_2d(x, y) + 0.1 * self.detail.get_noise_2d(x, y);
        let h = (f32::from(self.sea_level) + n * self.amplitude).clamp(0.0, f32::from(u16::MAX));
        let height = h as u16;
        let terrain = match height {
            h if h <= self.sea_level.saturating_add(8) => 0,
            h if h < self.sea_level.saturating_add((self.amplitude * 0.5) as u16) => 1,
            _ => 2,
        };
        Corner::new(height, terrain)
    }

    pub fn field(&self, pos: ChunkPos) -> HeightField {
        let w = self.chunk_width as i32;
        let mut corners = Vec::with_capacity(self.chunk_width * self.chunk_width);
        for y in 0..w {
            for x in 0..w {
                corners.push(self.corner(pos.x * w + x, pos.y * w + y));
            }
        }
        // Length is width * width by construction
        match HeightField::new(self.chunk_width, corners) {
            Ok(field) => field,
            Err(_) => HeightField::flat(self.chunk_width, self.sea_level, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_terrain() {
        let a = HeightGen::new(7, 8, 1000, 400.0);
        let b = HeightGen::new(7, 8, 1000, 400.0);
        let pos = ChunkPos::new(-3, 5);
        assert_eq!(a.field(pos).corners(), b.field(pos).corners());
    }

    #[test]
    fn neighbouring_chunks_share_the_noise_field() {
        let source = HeightGen::new(3, 8, 1000, 400.0);
        let west = source.field(ChunkPos::new(0, 0));
        let east = source.field(ChunkPos::new(1, 0));
        assert_eq!(west.corner(7, 2), source.corner(7, 2));
        assert_eq!(east.corner(0, 2), source.corner(8, 2));
    }
}
