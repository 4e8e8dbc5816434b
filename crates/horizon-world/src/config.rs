use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use horizon_mesh_cpu::constants::DEFAULT_UNDERGROWTH_NOISE_FREQUENCY;
use horizon_mesh_cpu::{LodParams, PlacementParams, PlacementRule};

use crate::WorldError;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct WorldConfig {
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub undergrowth: Undergrowth,
    #[serde(default)]
    pub runtime: Runtime,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Terrain {
    /// Corners per chunk edge.
    #[serde(default = "default_chunk_width")]
    pub chunk_width: usize,
    /// World units between neighbouring corners.
    #[serde(default = "default_square_width")]
    pub square_width: f32,
    /// World units per corner height unit.
    #[serde(default = "default_height_step")]
    pub height_step: f32,
    #[serde(default = "default_texture_repeats")]
    pub texture_repeats: f32,
    /// Texture name per terrain type; types past the end use the last entry.
    #[serde(default)]
    pub textures: Vec<String>,
}
fn default_chunk_width() -> usize {
    32
}
fn default_square_width() -> f32 {
    2.0
}
fn default_height_step() -> f32 {
    0.05
}
fn default_texture_repeats() -> f32 {
    4.0
}
impl Default for Terrain {
    fn default() -> Self {
        Self {
            chunk_width: default_chunk_width(),
            square_width: default_square_width(),
            height_step: default_height_step(),
            texture_repeats: default_texture_repeats(),
            textures: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct View {
    /// Chunks per LOD level: a chunk `d` chunks away uses LOD `floor(d / step)`.
    #[serde(default = "default_lod_distance_step")]
    pub lod_distance_step: f32,
    /// Wall-clock time one tick may spend polling LOD preparation.
    #[serde(default = "default_frame_budget_secs")]
    pub frame_budget_secs: f64,
    /// Publish view-areas but never create undergrowth.
    #[serde(default)]
    pub headless: bool,
}
fn default_lod_distance_step() -> f32 {
    12.0
}
fn default_frame_budget_secs() -> f64 {
    1.0 / 120.0
}
impl Default for View {
    fn default() -> Self {
        Self {
            lod_distance_step: default_lod_distance_step(),
            frame_budget_secs: default_frame_budget_secs(),
            headless: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Undergrowth {
    #[serde(default = "default_radius_chunks")]
    pub radius_chunks: u32,
    #[serde(default = "default_draw_distance")]
    pub draw_distance: f32,
    /// Multiplies every model's density.
    #[serde(default = "default_density")]
    pub density: f32,
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub models: Vec<UndergrowthModel>,
}
fn default_radius_chunks() -> u32 {
    2
}
fn default_draw_distance() -> f32 {
    60.0
}
fn default_density() -> f32 {
    1.0
}
fn default_noise_frequency() -> f32 {
    DEFAULT_UNDERGROWTH_NOISE_FREQUENCY
}
impl Default for Undergrowth {
    fn default() -> Self {
        Self {
            radius_chunks: default_radius_chunks(),
            draw_distance: default_draw_distance(),
            density: default_density(),
            noise_frequency: default_noise_frequency(),
            seed: 0,
            models: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UndergrowthModel {
    pub terrain_type: u8,
    pub model: String,
    pub material: String,
    /// Instances per square world unit.
    #[serde(default = "default_model_density")]
    pub density: f32,
    #[serde(default)]
    pub follow_ground_angle: bool,
    #[serde(default = "default_scale")]
    pub min_scale: f32,
    #[serde(default = "default_scale")]
    pub max_scale: f32,
}
fn default_model_density() -> f32 {
    0.05
}
fn default_scale() -> f32 {
    1.0
}

/// Worker counts per lane. Unset means derive from the machine; zero runs
/// that lane's jobs inline.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Runtime {
    #[serde(default)]
    pub lod_workers: Option<usize>,
    #[serde(default)]
    pub undergrowth_workers: Option<usize>,
}

impl WorldConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: WorldConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), WorldError> {
        let t = &self.terrain;
        if t.chunk_width == 0 || t.chunk_width > usize::from(u16::MAX) {
            return Err(WorldError::InvalidConfig("terrain.chunk_width must be 1..=65535"));
        }
        if !positive(t.square_width) || !positive(t.height_step) {
            return Err(WorldError::InvalidConfig(
                "terrain.square_width and terrain.height_step must be positive",
            ));
        }
        if !positive(self.view.lod_distance_step) {
            return Err(WorldError::InvalidConfig("view.lod_distance_step must be positive"));
        }
        let budget = self.view.frame_budget_secs;
        if !budget.is_finite() || budget < 0.0 {
            return Err(WorldError::InvalidConfig(
                "view.frame_budget_secs must be finite and not negative",
            ));
        }
        if !non_negative(self.undergrowth.density) {
            return Err(WorldError::InvalidConfig(
                "undergrowth.density must be finite and not negative",
            ));
        }
        if self
            .undergrowth
            .models
            .iter()
            .any(|m| m.min_scale > m.max_scale || !non_negative(m.density))
        {
            return Err(WorldError::InvalidConfig(
                "undergrowth model needs min_scale <= max_scale and a non-negative density",
            ));
        }
        Ok(())
    }

    /// World units along one chunk edge.
    pub fn chunk_size(&self) -> f32 {
        self.terrain.chunk_width as f32 * self.terrain.square_width
    }

    pub fn lod_params(&self) -> LodParams {
        LodParams {
            chunk_width: self.terrain.chunk_width,
            square_width: self.terrain.square_width,
            height_step: self.terrain.height_step,
            texture_repeats: self.terrain.texture_repeats,
        }
    }

    pub fn placement_params(&self) -> PlacementParams {
        let ug = &self.undergrowth;
        PlacementParams {
            chunk_width: self.terrain.chunk_width,
            square_width: self.terrain.square_width,
            height_step: self.terrain.height_step,
            seed: ug.seed,
            noise_frequency: ug.noise_frequency,
            rules: ug
                .models
                .iter()
                .map(|m| PlacementRule {
                    terrain: m.terrain_type,
                    density: m.density * ug.density,
                    follow_ground_angle: m.follow_ground_angle,
                    min_scale: m.min_scale,
                    max_scale: m.max_scale,
                })
                .collect(),
        }
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

pub fn load_config_from_path(path: &Path) -> Result<WorldConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    WorldConfig::from_toml_str(&s)
}
