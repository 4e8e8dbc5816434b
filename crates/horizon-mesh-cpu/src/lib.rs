//! CPU meshing for terrain chunks: LOD meshes, undergrowth scatter and batching.
#![forbid(unsafe_code)]

pub mod combine;
pub mod constants;
mod mesh_build;
pub mod terrain;
pub mod undergrowth;

pub use combine::{CombinedBatch, ModelTemplate, combine_placements};
pub use mesh_build::MeshBuild;
pub use terrain::{LodMesh, LodParams, build_lod_mesh, grid_coords, lod_step};
pub use undergrowth::{Placement, PlacementParams, PlacementRule, place_undergrowth};
