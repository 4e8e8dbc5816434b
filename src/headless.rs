use std::sync::Arc;

use hashbrown::HashMap;
use horizon_geom::{ChunkPos, Vec3};
use horizon_mesh_cpu::{CombinedBatch, LodMesh, MeshBuild};
use horizon_world::{ChunkView, Material, ResourceProvider, TerrainScene, TextureId};

/// Scene without a renderer: keeps what would be drawn and running totals.
#[derive(Default)]
pub struct HeadlessScene {
    pub visible: HashMap<ChunkPos, u8>,
    pub triangles: usize,
    pub undergrowth_batches: HashMap<ChunkPos, usize>,
    pub shows: usize,
    pub hides: usize,
}

impl HeadlessScene {
    pub fn lod_histogram(&self) -> Vec<(u8, usize)> {
        let mut counts: HashMap<u8, usize> = HashMap::new();
        for lod in self.visible.values() {
            *counts.entry(*lod).or_insert(0) += 1;
        }
        let mut out: Vec<(u8, usize)> = counts.into_iter().collect();
        out.sort_unstable();
        out
    }
}

impl TerrainScene for HeadlessScene {
    fn show_chunk(&mut self, pos: ChunkPos, view: ChunkView, mesh: &LodMesh, _material: &Material) {
        self.visible.insert(pos, view.lod);
        self.triangles += mesh.mesh.triangle_count();
        self.shows += 1;
    }

    fn hide_chunk(&mut self, pos: ChunkPos) {
        self.visible.remove(&pos);
        self.hides += 1;
    }

    fn show_undergrowth(&mut self, pos: ChunkPos, batches: &[CombinedBatch], _draw_distance: f32) {
        self.undergrowth_batches.insert(pos, batches.len());
    }

    fn hide_undergrowth(&mut self, pos: ChunkPos) {
        self.undergrowth_batches.remove(&pos);
    }
}

/// Hands out texture ids by name and a small cross-quad for every model.
#[derive(Default)]
pub struct GeneratedResources {
    textures: HashMap<String, TextureId>,
    models: HashMap<String, Arc<MeshBuild>>,
}

impl ResourceProvider for GeneratedResources {
    fn texture(&mut self, name: &str) -> Option<TextureId> {
        let next = TextureId(self.textures.len() as u32);
        Some(*self.textures.entry(name.to_string()).or_insert(next))
    }

    fn model(&mut self, name: &str) -> Option<Arc<MeshBuild>> {
        let mesh = self
            .models
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(cross_quad(0.5, 1.0)));
        Some(mesh.clone())
    }
}

/// Two crossed vertical quads, the usual grass-tuft shape.
fn cross_quad(half_width: f32, height: f32) -> MeshBuild {
    let mut mesh = MeshBuild::default();
    for (dx, dz) in [(half_width, 0.0), (0.0, half_width)] {
        let facing = Vec3::new(dz, 0.0, -dx).normalized();
        let a = mesh.push_vertex(Vec3::new(-dx, 0.0, -dz), facing, (0.0, 0.0));
        let b = mesh.push_vertex(Vec3::new(dx, 0.0, dz), facing, (1.0, 0.0));
        let c = mesh.push_vertex(Vec3::new(dx, height, dz), facing, (1.0, 1.0));
        let d = mesh.push_vertex(Vec3::new(-dx, height, -dz), facing, (0.0, 1.0));
        mesh.push_triangle_facing(a, b, c, facing);
        mesh.push_triangle_facing(a, c, d, facing);
    }
    mesh
}
