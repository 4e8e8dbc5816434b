//! Collaborator boundary: the renderer-side scene and the resource loader.
//!
//! The world never blocks on either. Lookups that are not ready yet return
//! `None` and the caller tries again on a later tick.

use std::sync::Arc;

use hashbrown::HashMap;
use horizon_geom::{ChunkPos, Vec3};
use horizon_mesh_cpu::{CombinedBatch, LodMesh, MeshBuild, ModelTemplate};

use crate::config::UndergrowthModel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Terrain material, one per terrain type.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub terrain: u8,
    /// `None` when no texture is configured at all.
    pub texture: Option<TextureId>,
}

/// Where and how a chunk renderable is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkView {
    /// Chunk position relative to the published origin.
    pub relative: ChunkPos,
    /// Translation of the chunk centre in the origin's frame.
    pub translation: Vec3,
    pub lod: u8,
}

/// Renderer-side scene the world shows and hides chunks in.
pub trait TerrainScene {
    /// Creates the renderable for `pos`, or swaps its model in place when it
    /// is already shown.
    fn show_chunk(&mut self, pos: ChunkPos, view: ChunkView, mesh: &LodMesh, material: &Material);
    fn hide_chunk(&mut self, pos: ChunkPos);
    fn show_undergrowth(&mut self, pos: ChunkPos, batches: &[CombinedBatch], draw_distance: f32);
    fn hide_undergrowth(&mut self, pos: ChunkPos);
    /// Drops any rendering resources still owned for `pos`.
    fn release_chunk(&mut self, _pos: ChunkPos) {}
}

/// Resource loader. Both lookups return `None` until the resource has been
/// loaded; implementations queue the load on the first miss.
pub trait ResourceProvider {
    fn texture(&mut self, name: &str) -> Option<TextureId>;
    fn model(&mut self, name: &str) -> Option<Arc<MeshBuild>>;
}

/// What chunks need from the world's resources.
pub trait AssetLookup {
    fn terrain_material(&mut self, terrain: u8) -> Option<Arc<Material>>;
    /// Templates for every undergrowth rule, indexed like the rules.
    fn undergrowth_templates(&mut self) -> Option<Vec<ModelTemplate>>;
}

/// Material cache keyed by terrain type in front of a [`ResourceProvider`].
pub struct Assets<R> {
    provider: R,
    textures: Vec<String>,
    models: Vec<UndergrowthModel>,
    materials: HashMap<u8, Arc<Material>>,
}

impl<R: ResourceProvider> Assets<R> {
    pub fn new(provider: R, textures: Vec<String>, models: Vec<UndergrowthModel>) -> Self {
        Self {
            provider,
            textures,
            models,
            materials: HashMap::new(),
        }
    }

    pub fn provider(&self) -> &R {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut R {
        &mut self.provider
    }

    pub fn cached_materials(&self) -> usize {
        self.materials.len()
    }
}

impl<R: ResourceProvider> AssetLookup for Assets<R> {
    fn terrain_material(&mut self, terrain: u8) -> Option<Arc<Material>> {
        if let Some(mat) = self.materials.get(&terrain) {
            return Some(mat.clone());
        }
        let texture = match self.textures.get(usize::from(terrain)).or(self.textures.last()) {
            Some(name) => Some(self.provider.texture(name)?),
            None => None,
        };
        let mat = Arc::new(Material { terrain, texture });
        self.materials.insert(terrain, mat.clone());
        Some(mat)
    }

    fn undergrowth_templates(&mut self) -> Option<Vec<ModelTemplate>> {
        let mut out = Vec::with_capacity(self.models.len());
        let mut ready = true;
        // Ask for every model so all loads are queued on the first miss
        for m in &self.models {
            match self.provider.model(&m.model) {
                Some(mesh) => out.push(ModelTemplate {
                    mesh,
                    material: m.material.clone(),
                }),
                None => ready = false,
            }
        }
        ready.then_some(out)
    }
}
