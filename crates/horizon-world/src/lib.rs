//! Streaming terrain world: chunks with per-LOD mesh caches, the view-area
//! scheduler that publishes visible sets around a moving viewer, and the
//! undergrowth manager.
#![forbid(unsafe_code)]

mod chunk;
pub mod config;
mod error;
pub mod scene;
pub mod scheduler;
mod undergrowth;
mod viewer;
mod world;

pub use chunk::{CachedLod, Chunk, LodCtx, UndergrowthCtx, UndergrowthStage};
pub use config::{WorldConfig, load_config_from_path};
pub use error::WorldError;
pub use scene::{
    AssetLookup, Assets, ChunkView, Material, ResourceProvider, TerrainScene, TextureId,
};
pub use scheduler::{candidate_area, lod_for_distance};
pub use viewer::Viewer;
pub use world::{ChunkWorld, ViewArea, WorldEvent};
