//! Merges placed instances into a few large batches, one run per material.

use std::sync::Arc;

use horizon_geom::{Aabb, Vec3};

use crate::MeshBuild;
use crate::constants::MAX_BATCH_VERTICES;
use crate::undergrowth::Placement;

/// Source geometry for the instances of one placement rule.
#[derive(Clone, Debug)]
pub struct ModelTemplate {
    pub mesh: Arc<MeshBuild>,
    pub material: String,
}

/// One drawable batch of merged instances.
#[derive(Clone, Debug)]
pub struct CombinedBatch {
    pub material: String,
    pub mesh: MeshBuild,
    pub bbox: Aabb,
}

/// Rotation taking `Vec3::UP` onto `up` (Rodrigues), applied after `yaw`.
#[derive(Clone, Copy, Debug)]
struct InstanceTransform {
    yaw_sin: f32,
    yaw_cos: f32,
    axis: Vec3,
    tilt_sin: f32,
    tilt_cos: f32,
    scale: f32,
    offset: Vec3,
}

impl InstanceTransform {
    fn new(p: &Placement) -> Self {
        let up = p.up.normalized();
        let cross = Vec3::UP.cross(up);
        let tilt_sin = cross.length();
        let axis = if tilt_sin > 1e-6 {
            cross / tilt_sin
        } else {
            Vec3::ZERO
        };
        Self {
            yaw_sin: p.yaw.sin(),
            yaw_cos: p.yaw.cos(),
            axis,
            tilt_sin,
            tilt_cos: Vec3::UP.dot(up),
            scale: p.scale,
            offset: p.position,
        }
    }

    fn rotate(&self, v: Vec3) -> Vec3 {
        let v = Vec3::new(
            v.x * self.yaw_cos + v.z * self.yaw_sin,
            v.y,
            -v.x * self.yaw_sin + v.z * self.yaw_cos,
        );
        if self.axis == Vec3::ZERO {
            return v;
        }
        let k = self.axis;
        v * self.tilt_cos + k.cross(v) * self.tilt_sin + k * (k.dot(v) * (1.0 - self.tilt_cos))
    }

    fn apply(&self, p: Vec3, n: Vec3) -> (Vec3, Vec3) {
        (
            self.rotate(p * self.scale) + self.offset,
            self.rotate(n).normalized(),
        )
    }
}

/// Combines `placements` using `templates[placement.rule]`. Batches keep the
/// order in which materials are first seen; a batch is split before it would
/// exceed the per-batch vertex cap.
pub fn combine_placements(placements: &[Placement], templates: &[ModelTemplate]) -> Vec<CombinedBatch> {
    let mut batches: Vec<CombinedBatch> = Vec::new();
    for p in placements {
        let Some(template) = templates.get(p.rule) else {
            log::warn!(target: "undergrowth", "no model for placement rule {}", p.rule);
            continue;
        };
        if template.mesh.is_empty() {
            continue;
        }
        let incoming = template.mesh.vertex_count();
        let open = batches.iter().rposition(|b| {
            b.material == template.material && b.mesh.vertex_count() + incoming <= MAX_BATCH_VERTICES
        });
        let bi = match open {
            Some(i) => i,
            None => {
                batches.push(CombinedBatch {
                    material: template.material.clone(),
                    mesh: MeshBuild::default(),
                    bbox: Aabb::EMPTY,
                });
                batches.len() - 1
            }
        };
        let xf = InstanceTransform::new(p);
        batches[bi].mesh.append_transformed(&template.mesh, |pos, n| xf.apply(pos, n));
    }
    for b in &mut batches {
        b.bbox = b.mesh.bbox();
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    fn placement(up: Vec3, yaw: f32) -> Placement {
        Placement {
            position: Vec3::new(1.0, 2.0, 3.0),
            yaw,
            up,
            scale: 2.0,
            rule: 0,
        }
    }

    #[test]
    fn upright_instance_only_scales_and_moves() {
        let xf = InstanceTransform::new(&placement(Vec3::UP, 0.0));
        let (p, n) = xf.apply(Vec3::new(0.5, 1.0, 0.0), Vec3::UP);
        assert!(approx(p, Vec3::new(2.0, 4.0, 3.0)));
        assert!(approx(n, Vec3::UP));
    }

    #[test]
    fn tilt_maps_up_onto_ground_normal() {
        let ground = Vec3::new(0.3, 1.0, -0.2).normalized();
        for yaw in [0.0f32, 1.0, 2.5] {
            let xf = InstanceTransform::new(&placement(ground, yaw));
            assert!(approx(xf.rotate(Vec3::UP), ground));
        }
    }

    #[test]
    fn yaw_turns_around_vertical() {
        let xf = InstanceTransform::new(&placement(Vec3::UP, std::f32::consts::FRAC_PI_2));
        let v = xf.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx(v, Vec3::new(0.0, 0.0, -1.0)));
    }
}
