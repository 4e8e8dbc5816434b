mod support;

use std::time::{Duration, Instant};

use hashbrown::HashSet;
use horizon_geom::{ChunkPos, Vec3};
use horizon_runtime::Runtime;
use horizon_world::{Viewer, WorldEvent};
use support::*;

fn at(x: i32, y: i32) -> ChunkPos {
    ChunkPos::new(x, y)
}

fn area_positions(world: &TestWorld) -> HashSet<ChunkPos> {
    world.view_area().keys().copied().collect()
}

#[test]
fn five_by_five_grid_radius_one_takes_the_disk() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 1)).unwrap();
    tick_until_published(&mut world, 5);

    // The Euclidean disk of radius 1 is the centre and its four edge neighbors
    let expected: HashSet<ChunkPos> =
        [at(0, 0), at(1, 0), at(-1, 0), at(0, 1), at(0, -1)].into_iter().collect();
    assert_eq!(area_positions(&world), expected);
    assert!(world.view_area().values().all(|&lod| lod == 0));
}

#[test]
fn five_by_five_grid_keeps_only_chunks_with_all_neighbors() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 2)).unwrap();
    let ticks = tick_until_published(&mut world, 5);
    // Build the candidate, submit every LOD, then collect and publish
    assert_eq!(ticks, 3);

    let mut expected = HashSet::new();
    for y in -1..=1 {
        for x in -1..=1 {
            expected.insert(at(x, y));
        }
    }
    assert_eq!(area_positions(&world), expected);
    assert!(world.view_area().values().all(|&lod| lod == 0));
    assert_eq!(world.scene().visible.len(), 9);

    let view = world.scene().views[&at(1, -1)];
    assert_eq!(view.relative, at(1, -1));
    assert_eq!(view.translation, Vec3::new(4.0, 0.0, -4.0));
}

#[test]
fn lods_grow_with_distance() {
    let mut cfg = config();
    cfg.view.lod_distance_step = 1.0;
    let mut world = world_with(cfg, Runtime::inline());
    fill_square(&mut world, ChunkPos::ZERO, 3);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 2)).unwrap();
    tick_until_published(&mut world, 5);

    let va = world.view_area();
    assert_eq!(va[&at(0, 0)], 0);
    assert_eq!(va[&at(1, 0)], 1);
    assert_eq!(va[&at(1, 1)], 1);
    assert_eq!(va[&at(-2, 0)], 2);
    assert!(!va.contains_key(&at(2, 2)));
    for (pos, lod) in va {
        assert_eq!(world.scene().visible.get(pos), Some(lod));
        assert!(world.get_chunk(*pos).unwrap().has_lod(*lod));
    }
}

#[test]
fn removing_a_chunk_abandons_the_view_area_being_built() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 2)).unwrap();
    world.tick();
    assert_eq!(world.view_area_being_built().map(|a| a.len()), Some(9));

    world.remove_chunk(at(1, 0)).unwrap();
    assert!(world.view_area_being_built().is_none());
    assert!(world.recalculation_required());

    tick_until_published(&mut world, 6);
    let expected: HashSet<ChunkPos> = [at(-1, -1), at(-1, 0), at(-1, 1)].into_iter().collect();
    assert_eq!(area_positions(&world), expected);
    assert!(!world.scene().ops.iter().any(|op| *op == SceneOp::Show { pos: at(1, 0), lod: 0 }));
}

#[test]
fn zero_frame_budget_advances_one_chunk_per_tick() {
    let mut cfg = config();
    cfg.view.frame_budget_secs = 0.0;
    let mut world = world_with(cfg, Runtime::inline());
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 2)).unwrap();

    world.tick();
    let candidate: Vec<ChunkPos> = world.view_area_being_built().unwrap().keys().copied().collect();
    assert_eq!(candidate.len(), 9);
    let started = |world: &TestWorld| {
        candidate
            .iter()
            .filter(|p| {
                let chunk = world.get_chunk(**p).unwrap();
                chunk.has_lod(0) || chunk.lod_in_flight().is_some()
            })
            .count()
    };

    // Each tick starts exactly one more build; finished ones are passed over
    for n in 1..=candidate.len() {
        world.tick();
        assert_eq!(started(&world), n);
        assert!(world.drain_events().is_empty());
        assert!(world.view_area().is_empty());
        assert!(world.scene().visible.is_empty());
    }
    assert!(!world.scene().ops.iter().any(|op| matches!(op, SceneOp::Show { .. })));

    // The last build is collected and the set goes out together
    world.tick();
    assert!(
        world
            .drain_events()
            .contains(&WorldEvent::ViewAreaPublished { shown: 9, hidden: 0 })
    );
    assert_eq!(world.scene().visible.len(), 9);
    assert!(world.view_area_being_built().is_none());
}

#[test]
fn publishing_swaps_the_whole_set_in_one_tick() {
    let mut cfg = config();
    cfg.view.headless = true;
    let mut world = world_with(cfg, Runtime::inline());
    fill_square(&mut world, ChunkPos::ZERO, 3);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 1)).unwrap();
    tick_until_published(&mut world, 5);
    world.scene_mut().take_ops();
    world.drain_events();

    // Walk one chunk east
    let chunk_size = world.config().chunk_size();
    world.viewer_mut().unwrap().local.x += chunk_size;

    let mut published = false;
    for _ in 0..6 {
        world.tick();
        let ops = world.scene_mut().take_ops();

        // Whatever the scene shows always matches the published set
        let visible = world.scene().visible.clone();
        assert_eq!(&visible, world.view_area());

        let mut shown = HashSet::new();
        for op in &ops {
            if let SceneOp::Show { pos, .. } = op {
                assert!(shown.insert(*pos), "{} shown twice in one tick", pos);
            }
        }
        if ops.is_empty() {
            continue;
        }
        assert!(!published, "the scene changed outside a publish");
        published = true;

        let hidden: HashSet<ChunkPos> = ops
            .iter()
            .filter_map(|op| match op {
                SceneOp::Hide(p) => Some(*p),
                _ => None,
            })
            .collect();
        let expected_hidden: HashSet<ChunkPos> =
            [at(-1, 0), at(0, 1), at(0, -1)].into_iter().collect();
        assert_eq!(hidden, expected_hidden);
        assert_eq!(shown.len(), 5);
        assert!(shown.contains(&at(0, 0)));
    }
    assert!(published);
    assert_eq!(world.origin(), at(1, 0));
    assert_eq!(world.scene().views[&at(0, 0)].relative, at(-1, 0));

    let events = world.drain_events();
    assert!(events.contains(&WorldEvent::OriginChanged {
        origin: at(1, 0),
        base_height: 0
    }));
    assert!(events.contains(&WorldEvent::ViewAreaPublished {
        shown: 5,
        hidden: 3
    }));
}

#[test]
fn first_publish_at_the_initial_origin_reports_no_move() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 1)).unwrap();
    let mut events = Vec::new();
    for _ in 0..3 {
        world.tick();
        events.extend(world.drain_events());
    }
    assert_eq!(
        events,
        vec![WorldEvent::ViewAreaPublished { shown: 5, hidden: 0 }]
    );
}

#[test]
fn prepare_for_lod_is_idempotent_once_built() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 1);
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    assert_eq!(world.get_chunk(ChunkPos::ZERO).unwrap().lod_in_flight(), Some(0));
    assert!(world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    let first = world.get_chunk(ChunkPos::ZERO).unwrap().cached_lod(0).unwrap().mesh.clone();
    for _ in 0..3 {
        assert!(world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    }
    let chunk = world.get_chunk(ChunkPos::ZERO).unwrap();
    assert_eq!(chunk.lod_in_flight(), None);
    // Still the first build: nothing was resubmitted
    assert!(std::sync::Arc::ptr_eq(&first, &chunk.cached_lod(0).unwrap().mesh));
}

#[test]
fn a_finished_build_is_kept_when_another_lod_is_asked_for() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 1);
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    // LOD 0 already finished inline; it is stored and LOD 1 starts
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 1).unwrap());
    let chunk = world.get_chunk(ChunkPos::ZERO).unwrap();
    assert!(chunk.has_lod(0));
    assert_eq!(chunk.lod_in_flight(), Some(1));
    assert!(world.prepare_for_lod(ChunkPos::ZERO, 1).unwrap());
}

#[test]
fn chunk_without_neighbors_never_builds() {
    let mut world = inline_world();
    world.add_chunk(ChunkPos::ZERO, flat_chunk(5)).unwrap();
    for _ in 0..3 {
        assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    }
    assert_eq!(world.get_chunk(ChunkPos::ZERO).unwrap().lod_in_flight(), None);
}

#[test]
fn builds_finished_before_the_material_loads_are_redone() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 1);
    world.resources_mut().loaded = false;
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    let chunk = world.get_chunk(ChunkPos::ZERO).unwrap();
    assert!(!chunk.has_lod(0));
    assert_eq!(chunk.lod_in_flight(), None);

    world.resources_mut().loaded = true;
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    assert!(world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
}

#[test]
fn editing_corners_invalidates_built_lods() {
    let mut world = inline_world();
    fill_square(&mut world, ChunkPos::ZERO, 1);
    assert!(!world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());
    assert!(world.prepare_for_lod(ChunkPos::ZERO, 0).unwrap());

    let corners = vec![horizon_chunk::Corner::new(3, 1); W * W];
    world.replace_corners(ChunkPos::ZERO, corners).unwrap();
    let chunk = world.get_chunk(ChunkPos::ZERO).unwrap();
    assert!(!chunk.has_lod(0));
    assert_eq!(chunk.lowest_height(), 3);
    assert!(world.recalculation_required());

    let err = world.replace_corners(ChunkPos::ZERO, vec![horizon_chunk::Corner::default(); 3]);
    assert!(matches!(err, Err(horizon_world::WorldError::HeightField(_))));
}

#[test]
fn headless_world_publishes_without_undergrowth() {
    let mut cfg = config();
    cfg.view.headless = true;
    let mut world = world_with(cfg, Runtime::inline());
    fill_square(&mut world, ChunkPos::ZERO, 2);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 1)).unwrap();
    tick_until_published(&mut world, 5);
    for _ in 0..4 {
        world.tick();
    }
    assert_eq!(world.view_area().len(), 5);
    assert!(world.scene().undergrowth.is_empty());
    assert_eq!(world.missing_undergrowth().count(), 0);
    assert_eq!(world.having_undergrowth().count(), 0);
}

#[test]
fn removing_chunks_with_builds_in_flight_does_not_stall() {
    let mut cfg = config();
    cfg.undergrowth.radius_chunks = 2;
    let mut world = world_with(cfg, Runtime::new(2, 1));
    fill_square(&mut world, ChunkPos::ZERO, 3);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, 0, 2)).unwrap();

    // Candidate, then submit every LOD
    world.tick();
    world.tick();
    world.remove_chunk(at(1, 1)).unwrap();
    tick_until_published(&mut world, 5_000);
    assert!(!world.view_area().contains_key(&at(1, 1)));
    assert!(!world.view_area().contains_key(&at(0, 0)));
    assert!(world.view_area().contains_key(&at(-1, -1)));

    // Placement jobs are now in flight around the origin
    world.tick();
    world.remove_chunk(at(-1, -1)).unwrap();
    world.remove_chunk(at(-1, 0)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        world.tick();
        if world.runtime().queue_debug_counts() == (0, 0, 0, 0) {
            break;
        }
        assert!(Instant::now() < deadline, "workers did not drain");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(world.get_chunk(at(-1, 0)).is_none());
    assert!(world.scene().ops.contains(&SceneOp::Release(at(-1, 0))));

    // The lanes still serve new work
    let deadline = Instant::now() + Duration::from_secs(10);
    while !world.prepare_for_lod(at(2, 2), 3).unwrap() {
        assert!(Instant::now() < deadline, "LOD build never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
}
