//! Shared constants for horizon-mesh-cpu.

/// Vertex cap for one combined undergrowth batch.
pub const MAX_BATCH_VERTICES: usize = 1 << 16;

/// Clumping-noise frequency used when a caller has no preference.
pub const DEFAULT_UNDERGROWTH_NOISE_FREQUENCY: f32 = 0.05;
