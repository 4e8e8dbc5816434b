use horizon_geom::{ChunkPos, Vec3};

/// The viewpoint the view-area is centred on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    /// Chunk the viewer is in; the published origin follows it.
    pub chunk: ChunkPos,
    /// Height units the viewer's local frame is lifted by.
    pub base_height: i32,
    /// Position inside the chunk, origin at its centre.
    pub local: Vec3,
    /// View radius in chunks.
    pub view_distance: u32,
}

impl Viewer {
    pub fn new(chunk: ChunkPos, base_height: i32, view_distance: u32) -> Self {
        Self {
            chunk,
            base_height,
            local: Vec3::ZERO,
            view_distance,
        }
    }

    /// Moves the viewer into the chunk that contains its local position.
    /// Returns true when the chunk changed.
    pub fn fix_if_outside_origin(&mut self, chunk_size: f32) -> bool {
        let half = chunk_size * 0.5;
        let dx = ((self.local.x + half) / chunk_size).floor() as i32;
        let dz = ((self.local.z + half) / chunk_size).floor() as i32;
        if dx == 0 && dz == 0 {
            return false;
        }
        self.chunk = self.chunk.offset(dx, dz);
        self.local.x -= dx as f32 * chunk_size;
        self.local.z -= dz as f32 * chunk_size;
        true
    }
}
