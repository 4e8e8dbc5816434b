//! One terrain chunk: height data, the LOD cache and its build pipeline, and
//! the undergrowth state machine.

use std::sync::Arc;

use hashbrown::HashMap;
use horizon_chunk::{Corners, HeightField, Neighborhood};
use horizon_geom::{ChunkPos, Vec3};
use horizon_mesh_cpu::{CombinedBatch, LodMesh, LodParams, Placement, PlacementParams};
use horizon_runtime::{CombineJob, LodBuildJob, PlacementJob, Runtime, TaskHandle, TaskPoll};

use crate::WorldError;
use crate::scene::{AssetLookup, ChunkView, Material, TerrainScene};

/// A built LOD together with the material it is drawn with.
#[derive(Clone, Debug)]
pub struct CachedLod {
    pub mesh: Arc<LodMesh>,
    pub material: Arc<Material>,
}

#[derive(Debug)]
enum LodTask {
    Idle,
    Pending { lod: u8, task: TaskHandle<LodMesh> },
}

/// Externally visible undergrowth state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndergrowthStage {
    NotInitialized,
    Placing,
    LoadingResources,
    Combining,
    Ready,
    StopPlacing,
}

#[derive(Debug)]
enum StoppingTask {
    Placing(TaskHandle<Vec<Placement>>),
    Combining(TaskHandle<Vec<CombinedBatch>>),
}

impl StoppingTask {
    /// True once the abandoned task can no longer deliver anything.
    fn finished(&self) -> bool {
        match self {
            StoppingTask::Placing(t) => !matches!(t.poll(), TaskPoll::Pending),
            StoppingTask::Combining(t) => !matches!(t.poll(), TaskPoll::Pending),
        }
    }
}

#[derive(Debug)]
enum Undergrowth {
    NotInitialized,
    Placing(TaskHandle<Vec<Placement>>),
    LoadingResources(Arc<[Placement]>),
    Combining {
        placements: Arc<[Placement]>,
        task: TaskHandle<Vec<CombinedBatch>>,
    },
    Ready {
        placements: Arc<[Placement]>,
        batches: Vec<CombinedBatch>,
    },
    StopPlacing(StoppingTask),
}

/// What a chunk needs to drive its LOD pipeline.
pub struct LodCtx<'a> {
    pub runtime: &'a Runtime,
    pub params: &'a LodParams,
    pub assets: &'a mut dyn AssetLookup,
}

/// What a chunk needs to drive its undergrowth.
pub struct UndergrowthCtx<'a> {
    pub runtime: &'a Runtime,
    pub params: &'a Arc<PlacementParams>,
    pub assets: &'a mut dyn AssetLookup,
    pub scene: &'a mut dyn TerrainScene,
    pub draw_distance: f32,
}

pub struct Chunk {
    base_height: i32,
    heights: Arc<HeightField>,
    lods: HashMap<u8, CachedLod>,
    lod_task: LodTask,
    shown: Option<u8>,
    undergrowth: Undergrowth,
}

impl Chunk {
    /// Takes ownership of `corners`, which must hold `width * width` samples.
    pub fn new(base_height: i32, width: usize, corners: Corners) -> Result<Self, WorldError> {
        Ok(Self::from_field(base_height, HeightField::new(width, corners)?))
    }

    pub fn from_field(base_height: i32, field: HeightField) -> Self {
        Self {
            base_height,
            heights: field.into_shared(),
            lods: HashMap::new(),
            lod_task: LodTask::Idle,
            shown: None,
            undergrowth: Undergrowth::NotInitialized,
        }
    }

    #[inline]
    pub fn base_height(&self) -> i32 {
        self.base_height
    }

    /// Shared snapshot of the current height data.
    #[inline]
    pub fn heights(&self) -> Arc<HeightField> {
        self.heights.clone()
    }

    #[inline]
    pub fn field(&self) -> &HeightField {
        &self.heights
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.heights.width()
    }

    #[inline]
    pub fn lowest_height(&self) -> u16 {
        self.heights.lowest_height()
    }

    #[inline]
    pub fn height(&self, x: usize, y: usize) -> u16 {
        self.heights.height(x, y)
    }

    /// Height where `x` or `y` may equal the chunk width; those corners come
    /// from the north, north-east or east chunk.
    pub fn height_with_neighbors(&self, x: usize, y: usize, n: &Chunk, ne: &Chunk, e: &Chunk) -> u16 {
        self.heights
            .height_with_neighbors(x, y, &n.heights, &ne.heights, &e.heights)
    }

    pub fn copy_corner_row(&self, dest: &mut Corners, x: usize, y: usize, count: usize) {
        self.heights.copy_corner_row(dest, x, y, count);
    }

    /// Replaces the height data. Every cached LOD and any LOD build started
    /// from the old data is dropped.
    pub fn set_corners(&mut self, corners: Corners) -> Result<(), WorldError> {
        let field = HeightField::new(self.width(), corners)?;
        self.heights = field.into_shared();
        self.lods.clear();
        self.lod_task = LodTask::Idle;
        Ok(())
    }

    pub fn write<W: std::io::Write>(&self, sink: &mut W) -> Result<(), WorldError> {
        Ok(self.heights.write(sink)?)
    }

    /// Writes corners in the same format as [`Chunk::write`] without a chunk.
    pub fn write_without_object<W: std::io::Write>(
        sink: &mut W,
        corners: &[horizon_chunk::Corner],
    ) -> Result<(), WorldError> {
        Ok(horizon_chunk::write_corners(sink, corners)?)
    }

    #[inline]
    pub fn has_lod(&self, lod: u8) -> bool {
        self.lods.contains_key(&lod)
    }

    pub fn cached_lod(&self, lod: u8) -> Option<&CachedLod> {
        self.lods.get(&lod)
    }

    /// LOD currently being built, if any.
    pub fn lod_in_flight(&self) -> Option<u8> {
        match self.lod_task {
            LodTask::Idle => None,
            LodTask::Pending { lod, .. } => Some(lod),
        }
    }

    pub fn shown_lod(&self) -> Option<u8> {
        self.shown
    }

    /// True when [`prepare_for_lod`](Self::prepare_for_lod) may submit a
    /// build and so needs a neighborhood snapshot.
    pub fn wants_lod_build(&self, lod: u8) -> bool {
        !self.has_lod(lod) && self.lod_in_flight() != Some(lod)
    }

    /// Call until it returns `Ok(true)`. Submits a build when idle (needs
    /// `neighborhood`), collects a finished build into the cache, and rejects a
    /// second LOD while another one is in flight.
    pub fn prepare_for_lod(
        &mut self,
        pos: ChunkPos,
        lod: u8,
        neighborhood: Option<Neighborhood>,
        ctx: &mut LodCtx<'_>,
    ) -> Result<bool, WorldError> {
        if self.has_lod(lod) {
            return Ok(true);
        }

        if let LodTask::Pending {
            lod: in_flight,
            task,
        } = &self.lod_task
        {
            let in_flight = *in_flight;
            match task.poll() {
                TaskPoll::Pending => {
                    if in_flight != lod {
                        return Err(WorldError::LodBusy {
                            pos,
                            requested: lod,
                            in_flight,
                        });
                    }
                    return Ok(false);
                }
                TaskPoll::Done(mesh) => {
                    self.lod_task = LodTask::Idle;
                    self.store_lod(pos, mesh, ctx.assets);
                    if in_flight == lod {
                        return Ok(self.has_lod(lod));
                    }
                }
                TaskPoll::Lost => {
                    log::warn!(target: "viewarea", "LOD {} build for {} was lost", in_flight, pos);
                    self.lod_task = LodTask::Idle;
                }
            }
        }

        // Idle: start a build if the caller could gather the neighborhood
        let Some(neighborhood) = neighborhood else {
            return Ok(false);
        };
        let task = ctx.runtime.submit_lod(LodBuildJob {
            pos,
            lod,
            base_height: self.base_height,
            neighborhood,
            params: *ctx.params,
        });
        self.lod_task = LodTask::Pending { lod, task };
        Ok(false)
    }

    fn store_lod(&mut self, pos: ChunkPos, mesh: LodMesh, assets: &mut dyn AssetLookup) {
        match assets.terrain_material(mesh.terrain) {
            Some(material) => {
                self.lods.insert(
                    mesh.lod,
                    CachedLod {
                        mesh: Arc::new(mesh),
                        material,
                    },
                );
            }
            None => {
                log::debug!(
                    target: "viewarea",
                    "material for terrain {} not ready; LOD {} of {} will be rebuilt",
                    mesh.terrain,
                    mesh.lod,
                    pos
                );
            }
        }
    }

    /// Shows the chunk at `lod`, placed relative to the published origin.
    /// Swaps the model in place when the chunk is already visible.
    #[allow(clippy::too_many_arguments)]
    pub fn show(
        &mut self,
        pos: ChunkPos,
        relative: ChunkPos,
        origin_height: i32,
        lod: u8,
        chunk_size: f32,
        height_step: f32,
        scene: &mut dyn TerrainScene,
    ) -> Result<(), WorldError> {
        let Some(cached) = self.lods.get(&lod) else {
            return Err(WorldError::LodNotReady { pos, lod });
        };
        let view = ChunkView {
            relative,
            translation: Vec3::new(
                relative.x as f32 * chunk_size,
                (self.base_height - origin_height) as f32 * height_step,
                relative.y as f32 * chunk_size,
            ),
            lod,
        };
        scene.show_chunk(pos, view, &cached.mesh, &cached.material);
        self.shown = Some(lod);
        Ok(())
    }

    /// Detaches the renderable. Cached LODs stay for reuse.
    pub fn hide(&mut self, pos: ChunkPos, scene: &mut dyn TerrainScene) {
        if self.shown.take().is_some() {
            scene.hide_chunk(pos);
        }
    }

    /// Hides the chunk and its undergrowth and releases its rendering
    /// resources. Outstanding jobs are abandoned: their handles go away with
    /// the chunk and the workers' replies are dropped.
    pub fn remove_from_world(mut self, pos: ChunkPos, scene: &mut dyn TerrainScene) {
        self.hide(pos, scene);
        if let Undergrowth::Ready { batches, .. } = &self.undergrowth {
            if !batches.is_empty() {
                scene.hide_undergrowth(pos);
            }
        }
        scene.release_chunk(pos);
    }

    pub fn undergrowth_stage(&self) -> UndergrowthStage {
        match self.undergrowth {
            Undergrowth::NotInitialized => UndergrowthStage::NotInitialized,
            Undergrowth::Placing(_) => UndergrowthStage::Placing,
            Undergrowth::LoadingResources(_) => UndergrowthStage::LoadingResources,
            Undergrowth::Combining { .. } => UndergrowthStage::Combining,
            Undergrowth::Ready { .. } => UndergrowthStage::Ready,
            Undergrowth::StopPlacing(_) => UndergrowthStage::StopPlacing,
        }
    }

    /// Placed instances, once placement has finished.
    pub fn undergrowth_placements(&self) -> Option<&[Placement]> {
        match &self.undergrowth {
            Undergrowth::LoadingResources(p)
            | Undergrowth::Combining { placements: p, .. }
            | Undergrowth::Ready { placements: p, .. } => Some(p),
            _ => None,
        }
    }

    /// True when [`create_undergrowth`](Self::create_undergrowth) could start
    /// placement and so needs a neighborhood snapshot.
    pub fn wants_undergrowth_snapshot(&self) -> bool {
        matches!(
            self.undergrowth,
            Undergrowth::NotInitialized | Undergrowth::StopPlacing(_)
        )
    }

    /// Call until it returns true. Each call advances at most one stage that
    /// waits on a background job.
    pub fn create_undergrowth(
        &mut self,
        pos: ChunkPos,
        neighborhood: Option<Neighborhood>,
        ctx: &mut UndergrowthCtx<'_>,
    ) -> bool {
        if let Undergrowth::StopPlacing(task) = &self.undergrowth {
            if !task.finished() {
                return false;
            }
            log::trace!(target: "undergrowth", "{}: discarded stopped work", pos);
            self.undergrowth = Undergrowth::NotInitialized;
        }

        if let Undergrowth::NotInitialized = self.undergrowth {
            let Some(neighborhood) = neighborhood else {
                return false;
            };
            let task = ctx.runtime.submit_placement(PlacementJob {
                pos,
                base_height: self.base_height,
                neighborhood,
                params: ctx.params.clone(),
            });
            log::trace!(target: "undergrowth", "{}: placing", pos);
            self.undergrowth = Undergrowth::Placing(task);
            return false;
        }

        if let Undergrowth::Placing(task) = &self.undergrowth {
            match task.poll() {
                TaskPoll::Pending => return false,
                TaskPoll::Done(placements) => {
                    log::trace!(
                        target: "undergrowth",
                        "{}: {} placements, loading resources",
                        pos,
                        placements.len()
                    );
                    self.undergrowth = Undergrowth::LoadingResources(placements.into());
                }
                TaskPoll::Lost => {
                    log::warn!(target: "undergrowth", "{}: placement job lost", pos);
                    self.undergrowth = Undergrowth::NotInitialized;
                    return false;
                }
            }
        }

        if let Undergrowth::LoadingResources(placements) = &self.undergrowth {
            let Some(templates) = ctx.assets.undergrowth_templates() else {
                return false;
            };
            let placements = placements.clone();
            let task = ctx.runtime.submit_combine(CombineJob {
                pos,
                placements: placements.clone(),
                templates,
            });
            log::trace!(target: "undergrowth", "{}: combining", pos);
            self.undergrowth = Undergrowth::Combining { placements, task };
            return false;
        }

        if let Undergrowth::Combining { placements, task } = &self.undergrowth {
            match task.poll() {
                TaskPoll::Pending => return false,
                TaskPoll::Done(batches) => {
                    if !batches.is_empty() {
                        ctx.scene.show_undergrowth(pos, &batches, ctx.draw_distance);
                    }
                    log::trace!(target: "undergrowth", "{}: ready with {} batches", pos, batches.len());
                    self.undergrowth = Undergrowth::Ready {
                        placements: placements.clone(),
                        batches,
                    };
                }
                TaskPoll::Lost => {
                    log::warn!(target: "undergrowth", "{}: combine job lost", pos);
                    self.undergrowth = Undergrowth::LoadingResources(placements.clone());
                    return false;
                }
            }
        }

        matches!(self.undergrowth, Undergrowth::Ready { .. })
    }

    /// Call until it returns true. Finished or idle undergrowth is released
    /// at once; running work is left to finish and then discarded.
    pub fn destroy_undergrowth(&mut self, pos: ChunkPos, scene: &mut dyn TerrainScene) -> bool {
        let state = std::mem::replace(&mut self.undergrowth, Undergrowth::NotInitialized);
        let (next, done) = match state {
            Undergrowth::NotInitialized | Undergrowth::LoadingResources(_) => {
                (Undergrowth::NotInitialized, true)
            }
            Undergrowth::Ready { batches, .. } => {
                if !batches.is_empty() {
                    scene.hide_undergrowth(pos);
                }
                (Undergrowth::NotInitialized, true)
            }
            Undergrowth::Placing(task) => {
                (Undergrowth::StopPlacing(StoppingTask::Placing(task)), false)
            }
            Undergrowth::Combining { task, .. } => {
                (Undergrowth::StopPlacing(StoppingTask::Combining(task)), false)
            }
            Undergrowth::StopPlacing(task) => {
                if task.finished() {
                    (Undergrowth::NotInitialized, true)
                } else {
                    (Undergrowth::StopPlacing(task), false)
                }
            }
        };
        if !done {
            log::trace!(target: "undergrowth", "{}: stopping", pos);
        }
        self.undergrowth = next;
        done
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("base_height", &self.base_height)
            .field("width", &self.width())
            .field("lods", &self.lods.keys().collect::<Vec<_>>())
            .field("lod_in_flight", &self.lod_in_flight())
            .field("shown", &self.shown)
            .field("undergrowth", &self.undergrowth_stage())
            .finish()
    }
}
