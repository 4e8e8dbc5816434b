use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use fastnoise_lite::{FastNoiseLite, NoiseType};
use horizon_chunk::Corner;
use horizon_geom::ChunkPos;
use horizon_mesh_cpu::{LodParams, PlacementParams, PlacementRule, build_lod_mesh, place_undergrowth};

const WIDTH: usize = 32;

fn noisy_window() -> Vec<Corner> {
    let mut noise = FastNoiseLite::with_seed(1337);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(0.03));
    let rw = WIDTH + 3;
    (0..rw * rw)
        .map(|i| {
            let (x, y) = ((i % rw) as f32, (i / rw) as f32);
            let h = (noise.get_noise_2d(x, y) + 1.0) * 400.0;
            Corner::new(h as u16, 0)
        })
        .collect()
}

fn params() -> LodParams {
    LodParams {
        chunk_width: WIDTH,
        square_width: 2.0,
        height_step: 0.05,
        texture_repeats: 4.0,
    }
}

fn bench_lod_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_lod_mesh");
    let window = noisy_window();
    let lowest = window.iter().map(|c| c.height).min().unwrap_or(0);
    let p = params();
    for lod in [0u8, 1, 3] {
        group.bench_function(format!("noise_32x32_lod{}", lod), |b| {
            b.iter(|| {
                let out = build_lod_mesh(black_box(&window), lod, 0, lowest, 0, &p);
                black_box(out);
            })
        });
    }
    group.finish();
}

fn bench_place_undergrowth(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_undergrowth");
    let window = noisy_window();
    let p = PlacementParams {
        chunk_width: WIDTH,
        square_width: 2.0,
        height_step: 0.05,
        seed: 7,
        noise_frequency: 0.05,
        rules: vec![PlacementRule {
            terrain: 0,
            density: 0.5,
            follow_ground_angle: true,
            min_scale: 0.8,
            max_scale: 1.2,
        }],
    };
    group.bench_function("dense_grass_32x32", |b| {
        b.iter(|| {
            let out = place_undergrowth(ChunkPos::new(2, 5), black_box(&window), 0, &p);
            black_box(out);
        })
    });
    group.finish();
}

fn config() -> Criterion {
    Criterion::default().measurement_time(Duration::from_secs(5))
}

criterion_group! {
    name = benches;
    config = config();
    targets = bench_lod_levels, bench_place_undergrowth
}
criterion_main!(benches);
