//! Headless terrain streaming driver.
//!
//! Generates a procedural height-field around a viewer, walks the viewer
//! across it, streams chunks in and out around the published origin, and
//! logs every view-area the world publishes.

mod headless;
mod heightgen;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use horizon_geom::ChunkPos;
use horizon_world::{Chunk, ChunkWorld, Viewer, WorldConfig, WorldEvent};
use serde::Deserialize;

use crate::headless::{GeneratedResources, HeadlessScene};
use crate::heightgen::HeightGen;

#[derive(Parser, Debug)]
#[command(name = "horizon", about = "Stream procedural terrain around a walking viewer")]
struct Args {
    /// World config (TOML). A `[driver]` table in the same file sets the
    /// defaults for the flags below.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Frames to run
    #[arg(long)]
    ticks: Option<u32>,
    /// View radius in chunks
    #[arg(long)]
    view_distance: Option<u32>,
    /// Chunks kept loaded around the origin, as a square radius
    #[arg(long)]
    load_radius: Option<i32>,
    /// World units the viewer walks east per frame
    #[arg(long)]
    speed: Option<f32>,
    #[arg(long)]
    seed: Option<i32>,
    /// Frame length; workers get this long to catch up between ticks
    #[arg(long)]
    frame_ms: Option<u64>,
    /// Never create undergrowth
    #[arg(long)]
    headless: bool,
    #[arg(long)]
    lod_workers: Option<usize>,
    #[arg(long)]
    undergrowth_workers: Option<usize>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct DriverConfig {
    ticks: u32,
    view_distance: u32,
    load_radius: i32,
    speed: f32,
    seed: i32,
    frame_ms: u64,
    sea_level: u16,
    amplitude: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ticks: 600,
            view_distance: 6,
            load_radius: 8,
            speed: 0.5,
            seed: 1337,
            frame_ms: 16,
            sea_level: 2000,
            amplitude: 900.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DriverFile {
    #[serde(default)]
    driver: DriverConfig,
}

fn load(args: &Args) -> Result<(WorldConfig, DriverConfig), Box<dyn Error>> {
    let (mut world, mut driver) = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let world = WorldConfig::from_toml_str(&text)?;
            let file: DriverFile = toml::from_str(&text)?;
            log::info!("loaded config from {}", path.display());
            (world, file.driver)
        }
        None => (WorldConfig::default(), DriverConfig::default()),
    };
    if let Some(v) = args.ticks {
        driver.ticks = v;
    }
    if let Some(v) = args.view_distance {
        driver.view_distance = v;
    }
    if let Some(v) = args.load_radius {
        driver.load_radius = v;
    }
    if let Some(v) = args.speed {
        driver.speed = v;
    }
    if let Some(v) = args.seed {
        driver.seed = v;
    }
    if let Some(v) = args.frame_ms {
        driver.frame_ms = v;
    }
    if args.headless {
        world.view.headless = true;
    }
    if args.lod_workers.is_some() {
        world.runtime.lod_workers = args.lod_workers;
    }
    if args.undergrowth_workers.is_some() {
        world.runtime.undergrowth_workers = args.undergrowth_workers;
    }
    world.validate()?;
    Ok((world, driver))
}

/// Loads every chunk in the square around `center` and drops chunks more
/// than one chunk outside it.
fn stream_chunks(
    world: &mut ChunkWorld<HeadlessScene, GeneratedResources>,
    heights: &HeightGen,
    center: ChunkPos,
    radius: i32,
) -> Result<(usize, usize), Box<dyn Error>> {
    let far: Vec<ChunkPos> = world
        .chunk_positions()
        .filter(|p| (p.x - center.x).abs() > radius + 1 || (p.y - center.y).abs() > radius + 1)
        .collect();
    for pos in &far {
        world.remove_chunk(*pos)?;
    }
    let mut added = 0;
    for y in -radius..=radius {
        for x in -radius..=radius {
            let pos = center.offset(x, y);
            if world.get_chunk(pos).is_none() {
                world.add_chunk(pos, Chunk::from_field(0, heights.field(pos)))?;
                added += 1;
            }
        }
    }
    Ok((added, far.len()))
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let (config, driver) = load(args)?;
    let heights = HeightGen::new(
        driver.seed,
        config.terrain.chunk_width,
        driver.sea_level,
        driver.amplitude,
    );
    let mut world = ChunkWorld::new(config, HeadlessScene::default(), GeneratedResources::default())?;

    let (added, _) = stream_chunks(&mut world, &heights, ChunkPos::ZERO, driver.load_radius)?;
    log::info!("generated {} chunks", added);
    let start_height = i32::from(heights.corner(0, 0).height);
    world.set_up_viewer(Viewer::new(ChunkPos::ZERO, start_height, driver.view_distance))?;
    let water_height = f32::from(heights.sea_level()) * world.config().terrain.height_step;
    world.set_up_water(0, water_height)?;

    let frame = Duration::from_millis(driver.frame_ms);
    let t0 = Instant::now();
    let mut publishes = 0usize;
    for tick in 0..driver.ticks {
        let frame_start = Instant::now();
        if let Some(viewer) = world.viewer_mut() {
            viewer.local.x += driver.speed;
        }
        world.tick();

        for event in world.drain_events() {
            match event {
                WorldEvent::OriginChanged {
                    origin,
                    base_height,
                } => {
                    let (added, removed) =
                        stream_chunks(&mut world, &heights, origin, driver.load_radius)?;
                    log::info!(
                        "tick {}: origin {} (base {}), streamed +{} -{} chunks",
                        tick,
                        origin,
                        base_height,
                        added,
                        removed
                    );
                }
                WorldEvent::ViewAreaPublished { shown, hidden } => {
                    publishes += 1;
                    log::info!(
                        "tick {}: view-area published, {} shown {} hidden, lods {:?}",
                        tick,
                        shown,
                        hidden,
                        world.scene().lod_histogram()
                    );
                }
            }
        }

        let (lq, li, uq, ui) = world.runtime().queue_debug_counts();
        log::trace!(
            "tick {}: lod {}+{} undergrowth {}+{} queued+running",
            tick,
            lq,
            li,
            uq,
            ui
        );
        if let Some(rest) = frame.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let scene = world.scene();
    log::info!(
        "{} ticks in {:.2}s: {} view-areas, {} chunks visible, {} shows, {} hides, {} triangles sent, {} chunks with undergrowth",
        driver.ticks,
        t0.elapsed().as_secs_f32(),
        publishes,
        scene.visible.len(),
        scene.shows,
        scene.hides,
        scene.triangles,
        scene.undergrowth_batches.len()
    );
    if let Some(water) = world.water_height_relative() {
        log::info!("water plane at {:.2} in the origin frame", water);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
