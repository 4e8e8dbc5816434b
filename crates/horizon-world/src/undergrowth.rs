use horizon_geom::{ChunkPos, disk_offsets};

use crate::chunk::UndergrowthCtx;
use crate::scene::{ResourceProvider, TerrainScene};
use crate::world::ChunkWorld;

impl<S: TerrainScene, R: ResourceProvider> ChunkWorld<S, R> {
    /// Re-evaluates undergrowth around the published origin: chunks inside
    /// the radius are created, chunks that left it are torn down. Chunks one
    /// past the radius keep theirs so the boundary does not thrash.
    pub fn start_creating_undergrowth(&mut self) {
        let origin = self.origin;
        let radius = self.config.undergrowth.radius_chunks;

        for off in disk_offsets(radius) {
            let pos = origin + off;
            if !self.chunks.contains_key(&pos) {
                self.missing_undergrowth.insert(pos);
                continue;
            }
            if !self.try_create(pos) {
                self.missing_undergrowth.insert(pos);
            }
            self.having_undergrowth.insert(pos);
        }

        let limit = radius as f32;
        let far_missing: Vec<ChunkPos> = self
            .missing_undergrowth
            .iter()
            .copied()
            .filter(|p| p.distance(origin) > limit)
            .collect();
        for pos in far_missing {
            if self.try_destroy(pos) {
                self.missing_undergrowth.remove(&pos);
                self.having_undergrowth.remove(&pos);
            }
        }

        let far_having: Vec<ChunkPos> = self
            .having_undergrowth
            .iter()
            .copied()
            .filter(|p| p.distance(origin) > limit + 1.0)
            .collect();
        for pos in far_having {
            if !self.chunks.contains_key(&pos) || self.try_destroy(pos) {
                self.having_undergrowth.remove(&pos);
                self.missing_undergrowth.remove(&pos);
            }
        }

        log::debug!(
            target: "undergrowth",
            "around {}: {} pending, {} tracked",
            origin,
            self.missing_undergrowth.len(),
            self.having_undergrowth.len()
        );
    }

    /// Retries every chunk still waiting for undergrowth. Chunks that are
    /// outside the radius are only waiting for a stop to finish; they are
    /// torn down instead of recreated.
    pub fn update_undergrowth(&mut self) {
        if self.missing_undergrowth.is_empty() {
            return;
        }
        let origin = self.origin;
        let limit = self.config.undergrowth.radius_chunks as f32;
        let pending: Vec<ChunkPos> = self.missing_undergrowth.iter().copied().collect();
        for pos in pending {
            if pos.distance(origin) > limit {
                if self.try_destroy(pos) {
                    self.missing_undergrowth.remove(&pos);
                    self.having_undergrowth.remove(&pos);
                }
            } else if self.try_create(pos) {
                self.missing_undergrowth.remove(&pos);
            }
        }
    }

    /// Chunks waiting for undergrowth to finish (or for their chunk to arrive).
    pub fn missing_undergrowth(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.missing_undergrowth.iter().copied()
    }

    /// Chunks that have undergrowth or are building it.
    pub fn having_undergrowth(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.having_undergrowth.iter().copied()
    }

    fn try_create(&mut self, pos: ChunkPos) -> bool {
        let Some(chunk) = self.chunks.get(&pos) else {
            return false;
        };
        let hood = if chunk.wants_undergrowth_snapshot() {
            self.neighborhood(pos)
        } else {
            None
        };
        let draw_distance = self.config.undergrowth.draw_distance;
        let Self {
            chunks,
            runtime,
            placement_params,
            assets,
            scene,
            ..
        } = self;
        let Some(chunk) = chunks.get_mut(&pos) else {
            return false;
        };
        let mut ctx = UndergrowthCtx {
            runtime,
            params: placement_params,
            assets,
            scene,
            draw_distance,
        };
        chunk.create_undergrowth(pos, hood, &mut ctx)
    }

    /// A chunk that is gone has nothing left to tear down.
    fn try_destroy(&mut self, pos: ChunkPos) -> bool {
        match self.chunks.get_mut(&pos) {
            Some(chunk) => chunk.destroy_undergrowth(pos, &mut self.scene),
            None => true,
        }
    }
}
