#![allow(dead_code)]

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use horizon_chunk::HeightField;
use horizon_geom::{ChunkPos, Vec3};
use horizon_mesh_cpu::{CombinedBatch, LodMesh, MeshBuild};
use horizon_runtime::Runtime;
use horizon_world::config::UndergrowthModel;
use horizon_world::{
    Chunk, ChunkView, ChunkWorld, Material, ResourceProvider, TerrainScene, TextureId, WorldConfig,
};

pub const W: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub enum SceneOp {
    Show { pos: ChunkPos, lod: u8 },
    Hide(ChunkPos),
    ShowUndergrowth { pos: ChunkPos, batches: usize },
    HideUndergrowth(ChunkPos),
    Release(ChunkPos),
}

/// Scene that records every call and mirrors what would be on screen.
#[derive(Default)]
pub struct RecordingScene {
    pub ops: Vec<SceneOp>,
    pub visible: HashMap<ChunkPos, u8>,
    pub views: HashMap<ChunkPos, ChunkView>,
    pub undergrowth: HashSet<ChunkPos>,
}

impl RecordingScene {
    pub fn take_ops(&mut self) -> Vec<SceneOp> {
        std::mem::take(&mut self.ops)
    }
}

impl TerrainScene for RecordingScene {
    fn show_chunk(&mut self, pos: ChunkPos, view: ChunkView, mesh: &LodMesh, _material: &Material) {
        assert_eq!(mesh.lod, view.lod);
        self.ops.push(SceneOp::Show { pos, lod: view.lod });
        self.visible.insert(pos, view.lod);
        self.views.insert(pos, view);
    }

    fn hide_chunk(&mut self, pos: ChunkPos) {
        self.ops.push(SceneOp::Hide(pos));
        assert!(self.visible.remove(&pos).is_some(), "hid {} while not shown", pos);
        self.views.remove(&pos);
    }

    fn show_undergrowth(&mut self, pos: ChunkPos, batches: &[CombinedBatch], _draw_distance: f32) {
        self.ops.push(SceneOp::ShowUndergrowth {
            pos,
            batches: batches.len(),
        });
        self.undergrowth.insert(pos);
    }

    fn hide_undergrowth(&mut self, pos: ChunkPos) {
        self.ops.push(SceneOp::HideUndergrowth(pos));
        self.undergrowth.remove(&pos);
    }

    fn release_chunk(&mut self, pos: ChunkPos) {
        self.ops.push(SceneOp::Release(pos));
    }
}

/// Resources that are loaded from the start unless `loaded` is cleared.
pub struct InstantResources {
    pub loaded: bool,
    pub model: Arc<MeshBuild>,
}

impl Default for InstantResources {
    fn default() -> Self {
        let mut tri = MeshBuild::default();
        let a = tri.push_vertex(Vec3::new(-0.5, 0.0, 0.0), Vec3::UP, (0.0, 0.0));
        let b = tri.push_vertex(Vec3::new(0.5, 0.0, 0.0), Vec3::UP, (1.0, 0.0));
        let c = tri.push_vertex(Vec3::new(0.0, 1.0, 0.0), Vec3::UP, (0.5, 1.0));
        tri.push_triangle(a, b, c);
        Self {
            loaded: true,
            model: Arc::new(tri),
        }
    }
}

impl ResourceProvider for InstantResources {
    fn texture(&mut self, _name: &str) -> Option<TextureId> {
        self.loaded.then_some(TextureId(1))
    }

    fn model(&mut self, _name: &str) -> Option<Arc<MeshBuild>> {
        self.loaded.then(|| self.model.clone())
    }
}

pub type TestWorld = ChunkWorld<RecordingScene, InstantResources>;

pub fn config() -> WorldConfig {
    let mut cfg = WorldConfig::default();
    cfg.terrain.chunk_width = W;
    cfg.terrain.square_width = 1.0;
    cfg.terrain.height_step = 0.1;
    cfg.terrain.textures = vec!["grass".into()];
    cfg.view.frame_budget_secs = 10.0;
    cfg.undergrowth.radius_chunks = 1;
    cfg.undergrowth.models = vec![UndergrowthModel {
        terrain_type: 1,
        model: "fern".into(),
        material: "fern_mat".into(),
        density: 10.0,
        follow_ground_angle: false,
        min_scale: 1.0,
        max_scale: 1.0,
    }];
    cfg
}

pub fn world_with(cfg: WorldConfig, runtime: Runtime) -> TestWorld {
    ChunkWorld::with_runtime(cfg, runtime, RecordingScene::default(), InstantResources::default())
        .unwrap()
}

pub fn inline_world() -> TestWorld {
    world_with(config(), Runtime::inline())
}

pub fn flat_chunk(height: u16) -> Chunk {
    Chunk::from_field(0, HeightField::flat(W, height, 1))
}

/// Adds a flat chunk at every position of the square `-r..=r` around `center`.
pub fn fill_square(world: &mut TestWorld, center: ChunkPos, r: i32) {
    for y in -r..=r {
        for x in -r..=r {
            let pos = center.offset(x, y);
            if world.get_chunk(pos).is_none() {
                world.add_chunk(pos, flat_chunk(20)).unwrap();
            }
        }
    }
}

/// Ticks until a view-area is published, returning how many ticks it took.
pub fn tick_until_published(world: &mut TestWorld, max_ticks: usize) -> usize {
    for n in 1..=max_ticks {
        world.tick();
        let published = world
            .drain_events()
            .iter()
            .any(|e| matches!(e, horizon_world::WorldEvent::ViewAreaPublished { .. }));
        if published {
            return n;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("no view-area published within {} ticks", max_ticks);
}
