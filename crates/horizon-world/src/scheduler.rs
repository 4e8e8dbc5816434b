//! Per-frame view-area scheduling: build a candidate set around the viewer,
//! drive its LODs under the frame budget, then publish it in one step.

use std::time::Instant;

use horizon_geom::{ChunkPos, disk_offsets};

use crate::WorldError;
use crate::scene::{ResourceProvider, TerrainScene};
use crate::world::{Candidate, ChunkWorld, ViewArea, WorldEvent};

/// LOD for a chunk `distance` chunks from the origin.
#[inline]
pub fn lod_for_distance(distance: f32, lod_distance_step: f32) -> u8 {
    (distance / lod_distance_step).floor().clamp(0.0, f32::from(u8::MAX)) as u8
}

/// Every position of the disk around `center` whose chunk and all eight
/// neighbors satisfy `present`, with its LOD.
pub fn candidate_area<F>(
    center: ChunkPos,
    view_distance: u32,
    lod_distance_step: f32,
    present: F,
) -> ViewArea
where
    F: Fn(ChunkPos) -> bool,
{
    let mut area = ViewArea::new();
    for off in disk_offsets(view_distance) {
        let pos = center + off;
        if !present(pos) || !pos.neighbors().into_iter().all(&present) {
            continue;
        }
        area.insert(pos, lod_for_distance(off.length(), lod_distance_step));
    }
    area
}

impl<S: TerrainScene, R: ResourceProvider> ChunkWorld<S, R> {
    /// One frame of scheduling. Polls the view-area being built within the
    /// frame budget and publishes it once complete, re-centres the viewer,
    /// advances undergrowth and starts a new view-area when one is required.
    pub fn tick(&mut self) {
        let start = Instant::now();

        if self.candidate.is_some() && self.poll_candidate(start) {
            self.publish_candidate();
        }

        let chunk_size = self.config.chunk_size();
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        if viewer.fix_if_outside_origin(chunk_size) {
            log::debug!(target: "viewarea", "viewer moved into {}", viewer.chunk);
            self.recalculation_required = true;
        }

        self.update_undergrowth();

        if self.recalculation_required && self.candidate.is_none() {
            self.build_candidate();
        }
    }

    /// True once every entry of the candidate has its LOD built.
    fn poll_candidate(&mut self, start: Instant) -> bool {
        let Some(candidate) = self.candidate.as_ref() else {
            return false;
        };
        let entries: Vec<(ChunkPos, u8)> =
            candidate.area.iter().map(|(p, l)| (*p, *l)).collect();
        let mut everything_ready = true;
        // Entries polled this tick that are still waiting. Ready entries are
        // passed over so that at least one unfinished chunk advances per tick,
        // whatever the budget.
        let mut waiting = 0usize;
        for (pos, lod) in entries {
            if waiting > 0 && start.elapsed() > self.frame_budget {
                log::trace!(
                    target: "viewarea",
                    "frame budget spent with {} chunks advanced",
                    waiting
                );
                everything_ready = false;
                break;
            }
            match self.prepare_for_lod(pos, lod) {
                Ok(true) => {}
                Ok(false) => {
                    everything_ready = false;
                    waiting += 1;
                }
                Err(WorldError::LodBusy { in_flight, .. }) => {
                    log::trace!(
                        target: "viewarea",
                        "{} still building LOD {}; waiting for LOD {}",
                        pos,
                        in_flight,
                        lod
                    );
                    everything_ready = false;
                    waiting += 1;
                }
                Err(e) => {
                    log::warn!(target: "viewarea", "preparing {}: {}", pos, e);
                    everything_ready = false;
                    waiting += 1;
                }
            }
        }
        everything_ready
    }

    fn publish_candidate(&mut self) {
        let Some(Candidate {
            area,
            origin,
            origin_height,
        }) = self.candidate.take()
        else {
            return;
        };
        let chunk_size = self.config.chunk_size();
        let height_step = self.config.terrain.height_step;

        let Self {
            chunks,
            scene,
            va,
            ..
        } = self;
        let mut hidden = 0usize;
        for pos in va.keys() {
            if area.contains_key(pos) {
                continue;
            }
            if let Some(chunk) = chunks.get_mut(pos) {
                chunk.hide(*pos, scene);
            }
            hidden += 1;
        }
        for (&pos, &lod) in &area {
            let Some(chunk) = chunks.get_mut(&pos) else {
                continue;
            };
            let relative = pos - origin;
            if let Err(e) =
                chunk.show(pos, relative, origin_height, lod, chunk_size, height_step, scene)
            {
                log::warn!(target: "viewarea", "showing {}: {}", pos, e);
            }
        }
        let shown = area.len();
        *va = area;

        let origin_changed = origin != self.origin || origin_height != self.origin_height;
        self.origin = origin;
        self.origin_height = origin_height;
        log::info!(
            target: "viewarea",
            "published view-area at {}: {} shown, {} hidden{}",
            origin,
            shown,
            hidden,
            if origin_changed { ", origin moved" } else { "" }
        );
        if origin_changed {
            self.events.push(WorldEvent::OriginChanged {
                origin,
                base_height: origin_height,
            });
        }
        self.events.push(WorldEvent::ViewAreaPublished { shown, hidden });

        if !self.config.view.headless {
            self.start_creating_undergrowth();
        }
    }

    fn build_candidate(&mut self) {
        let Some(viewer) = self.viewer else {
            return;
        };
        let chunks = &self.chunks;
        let area = candidate_area(
            viewer.chunk,
            viewer.view_distance,
            self.config.view.lod_distance_step,
            |p| chunks.contains_key(&p),
        );
        self.recalculation_required = false;
        if area.is_empty() {
            log::debug!(
                target: "viewarea",
                "no chunk around {} has all its neighbors; nothing to build",
                viewer.chunk
            );
            return;
        }
        log::debug!(
            target: "viewarea",
            "building view-area of {} chunks around {}",
            area.len(),
            viewer.chunk
        );
        self.candidate = Some(Candidate {
            area,
            origin: viewer.chunk,
            origin_height: viewer.base_height,
        });
    }
}
