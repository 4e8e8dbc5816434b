use std::sync::Arc;
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use horizon_chunk::sampler::{CellHeights, height_from_corners, locate_cell, normal_from_corners};
use horizon_chunk::{Corners, Neighborhood};
use horizon_geom::{ChunkPos, Vec2, Vec3};
use horizon_mesh_cpu::{LodParams, PlacementParams};
use horizon_runtime::Runtime;

use crate::WorldError;
use crate::chunk::{Chunk, LodCtx};
use crate::config::WorldConfig;
use crate::scene::{Assets, ResourceProvider, TerrainScene};
use crate::viewer::Viewer;

/// Published or candidate mapping of chunk position to LOD.
pub type ViewArea = HashMap<ChunkPos, u8>;

/// Notifications for collaborators, drained with [`ChunkWorld::drain_events`].
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    OriginChanged { origin: ChunkPos, base_height: i32 },
    ViewAreaPublished { shown: usize, hidden: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Water {
    pub(crate) base_height: i32,
    pub(crate) height: f32,
}

/// A view-area being prepared. Published only once every entry is ready.
#[derive(Clone, Debug, Default)]
pub(crate) struct Candidate {
    pub(crate) area: ViewArea,
    pub(crate) origin: ChunkPos,
    pub(crate) origin_height: i32,
}

/// The chunk map and everything that decides which chunks are shown.
pub struct ChunkWorld<S, R> {
    pub(crate) config: WorldConfig,
    pub(crate) lod_params: LodParams,
    pub(crate) placement_params: Arc<PlacementParams>,
    pub(crate) frame_budget: Duration,
    pub(crate) chunks: HashMap<ChunkPos, Chunk>,
    pub(crate) runtime: Runtime,
    pub(crate) scene: S,
    pub(crate) assets: Assets<R>,
    pub(crate) viewer: Option<Viewer>,
    pub(crate) water: Option<Water>,
    pub(crate) va: ViewArea,
    pub(crate) origin: ChunkPos,
    pub(crate) origin_height: i32,
    pub(crate) candidate: Option<Candidate>,
    pub(crate) recalculation_required: bool,
    pub(crate) missing_undergrowth: HashSet<ChunkPos>,
    pub(crate) having_undergrowth: HashSet<ChunkPos>,
    pub(crate) events: Vec<WorldEvent>,
}

impl<S: TerrainScene, R: ResourceProvider> ChunkWorld<S, R> {
    /// Builds the world with worker lanes sized from `config.runtime`.
    pub fn new(config: WorldConfig, scene: S, resources: R) -> Result<Self, WorldError> {
        let (auto_lod, auto_ug) = Runtime::default_worker_counts();
        let runtime = Runtime::new(
            config.runtime.lod_workers.unwrap_or(auto_lod),
            config.runtime.undergrowth_workers.unwrap_or(auto_ug),
        );
        Self::with_runtime(config, runtime, scene, resources)
    }

    pub fn with_runtime(
        config: WorldConfig,
        runtime: Runtime,
        scene: S,
        resources: R,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let assets = Assets::new(
            resources,
            config.terrain.textures.clone(),
            config.undergrowth.models.clone(),
        );
        Ok(Self {
            lod_params: config.lod_params(),
            placement_params: Arc::new(config.placement_params()),
            frame_budget: Duration::from_secs_f64(config.view.frame_budget_secs),
            config,
            chunks: HashMap::new(),
            runtime,
            scene,
            assets,
            viewer: None,
            water: None,
            va: ViewArea::new(),
            origin: ChunkPos::ZERO,
            origin_height: 0,
            candidate: None,
            recalculation_required: false,
            missing_undergrowth: HashSet::new(),
            having_undergrowth: HashSet::new(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn resources_mut(&mut self) -> &mut R {
        self.assets.provider_mut()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn add_chunk(&mut self, pos: ChunkPos, chunk: Chunk) -> Result<(), WorldError> {
        if self.chunks.contains_key(&pos) {
            return Err(WorldError::ChunkExists(pos));
        }
        let expected = self.config.terrain.chunk_width;
        if chunk.width() != expected {
            return Err(WorldError::WidthMismatch {
                pos,
                expected,
                actual: chunk.width(),
            });
        }
        self.chunks.insert(pos, chunk);
        self.recalculation_required = true;
        Ok(())
    }

    /// Removes and tears down the chunk. A view-area being built is dropped
    /// and rebuilt from scratch on a later tick.
    pub fn remove_chunk(&mut self, pos: ChunkPos) -> Result<(), WorldError> {
        let chunk = self.chunks.remove(&pos).ok_or(WorldError::NoSuchChunk(pos))?;
        chunk.remove_from_world(pos, &mut self.scene);
        self.va.remove(&pos);
        if let Some(candidate) = self.candidate.take() {
            log::debug!(
                target: "viewarea",
                "chunk {} removed; abandoning view-area of {} chunks",
                pos,
                candidate.area.len()
            );
        }
        self.recalculation_required = true;
        Ok(())
    }

    pub fn get_chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn get_chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Replaces the chunk's corners and requests a new view-area.
    pub fn replace_corners(&mut self, pos: ChunkPos, corners: Corners) -> Result<(), WorldError> {
        let chunk = self.chunks.get_mut(&pos).ok_or(WorldError::NoSuchChunk(pos))?;
        chunk.set_corners(corners)?;
        self.recalculation_required = true;
        Ok(())
    }

    pub(crate) fn neighborhood(&self, pos: ChunkPos) -> Option<Neighborhood> {
        Neighborhood::gather(pos, |p| self.chunks.get(&p).map(|c| c.heights()))
    }

    /// Fills `result` with the padded `(width + 3)^2` corner window around
    /// `pos`, or leaves it empty if any of the nine chunks is missing.
    pub fn extract_corners_data(&self, result: &mut Corners, pos: ChunkPos) {
        match self.neighborhood(pos) {
            Some(hood) => hood.fill_padded_window(result),
            None => result.clear(),
        }
    }

    /// Drives the chunk at `pos` towards having `lod` built. See
    /// [`Chunk::prepare_for_lod`].
    pub fn prepare_for_lod(&mut self, pos: ChunkPos, lod: u8) -> Result<bool, WorldError> {
        let chunk = self.chunks.get(&pos).ok_or(WorldError::NoSuchChunk(pos))?;
        let hood = if chunk.wants_lod_build(lod) {
            self.neighborhood(pos)
        } else {
            None
        };
        let Self {
            chunks,
            runtime,
            lod_params,
            assets,
            ..
        } = self;
        let chunk = chunks.get_mut(&pos).ok_or(WorldError::NoSuchChunk(pos))?;
        let mut ctx = LodCtx {
            runtime,
            params: lod_params,
            assets,
        };
        chunk.prepare_for_lod(pos, lod, hood, &mut ctx)
    }

    pub fn set_up_viewer(&mut self, viewer: Viewer) -> Result<(), WorldError> {
        if self.viewer.is_some() {
            return Err(WorldError::ViewerAlreadySet);
        }
        self.viewer = Some(viewer);
        self.recalculation_required = true;
        Ok(())
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn viewer_mut(&mut self) -> Option<&mut Viewer> {
        self.viewer.as_mut()
    }

    pub fn set_up_water(&mut self, base_height: i32, height: f32) -> Result<(), WorldError> {
        if self.water.is_some() {
            return Err(WorldError::WaterAlreadySet);
        }
        if self.viewer.is_none() {
            return Err(WorldError::WaterBeforeViewer);
        }
        self.water = Some(Water {
            base_height,
            height,
        });
        Ok(())
    }

    /// Water plane height in the published origin's frame.
    pub fn water_height_relative(&self) -> Option<f32> {
        let w = self.water?;
        Some(w.height + (w.base_height - self.origin_height) as f32 * self.config.terrain.height_step)
    }

    pub fn origin(&self) -> ChunkPos {
        self.origin
    }

    pub fn origin_height(&self) -> i32 {
        self.origin_height
    }

    pub fn view_area(&self) -> &ViewArea {
        &self.va
    }

    /// The view-area currently being prepared, if any.
    pub fn view_area_being_built(&self) -> Option<&ViewArea> {
        self.candidate.as_ref().map(|c| &c.area)
    }

    pub fn recalculation_required(&self) -> bool {
        self.recalculation_required
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    fn cell_heights(&self, chunk_pos: ChunkPos, local: Vec2, base_height: i32) -> Option<(CellHeights, Vec2)> {
        let w = self.config.terrain.chunk_width;
        let (ix, iy, f) = locate_cell(local, w, self.config.terrain.square_width);
        let chunk = self.chunks.get(&chunk_pos)?;
        let n = self.chunks.get(&chunk_pos.offset(0, 1))?;
        let ne = self.chunks.get(&chunk_pos.offset(1, 1))?;
        let e = self.chunks.get(&chunk_pos.offset(1, 0))?;
        let cell = chunk.field().cell_heights(
            ix,
            iy,
            n.field(),
            ne.field(),
            e.field(),
            base_height,
            self.config.terrain.height_step,
        );
        Some((cell, f))
    }

    /// Terrain height at `local` (chunk-local, origin at the chunk centre)
    /// relative to `base_height`. `None` while a needed chunk is missing.
    pub fn height_at(&self, chunk_pos: ChunkPos, local: Vec2, base_height: i32) -> Option<f32> {
        let (cell, f) = self.cell_heights(chunk_pos, local, base_height)?;
        Some(height_from_corners(&cell, f))
    }

    pub fn normal_at(&self, chunk_pos: ChunkPos, local: Vec2) -> Option<Vec3> {
        let (cell, f) = self.cell_heights(chunk_pos, local, 0)?;
        Some(normal_from_corners(&cell, f, self.config.terrain.square_width))
    }
}
