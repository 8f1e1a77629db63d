//! Benchmark for noise sampling performance.
//!
//! A 1024x1024 world samples material and detail noise once per pixel in
//! the cell pass, so per-sample cost dominates generation time.
//!
//! Run with: cargo bench --package strata_procedural --bench noise_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_procedural::noise::{hash01, NoiseProvider, NoiseSettings, WorldSeed};

fn benchmark_single_samples(c: &mut Criterion) {
    let noise = NoiseProvider::new(WorldSeed::new(42));
    let kinds = [
        ("perlin_5_octaves", NoiseSettings::perlin(0.004, 5, 0.5)),
        ("ridged_4_octaves", NoiseSettings::ridged(0.01, 4, 0.5)),
        ("worley_1_point", NoiseSettings::worley(0.05, 1)),
        ("voronoi_2_points", NoiseSettings::voronoi(0.05, 2)),
    ];

    for (name, settings) in kinds {
        c.bench_function(name, |b| {
            let mut x = 0.0f64;
            b.iter(|| {
                x += 1.0;
                black_box(noise.sample(black_box(&settings), black_box(x), black_box(x * 0.7)))
            });
        });
    }
}

fn benchmark_million_samples(c: &mut Criterion) {
    let noise = NoiseProvider::new(WorldSeed::new(42));
    let settings = NoiseSettings::perlin(0.35, 2, 0.5);

    let mut group = c.benchmark_group("million_samples");
    group.throughput(Throughput::Elements(1_000_000));
    group.sample_size(10);

    group.bench_function("1M_detail_samples", |b| {
        b.iter(|| {
            for i in 0..1_000_000 {
                let x = f64::from(i % 1000);
                let y = f64::from(i / 1000);
                black_box(noise.sample(&settings, x, y));
            }
        });
    });

    group.finish();
}

fn benchmark_hash_roll(c: &mut Criterion) {
    let seed = WorldSeed::new(42);

    c.bench_function("hash01_roll", |b| {
        let mut x = 0i64;
        b.iter(|| {
            x += 1;
            black_box(hash01(black_box(x), black_box(x / 3), seed))
        });
    });
}

criterion_group!(
    benches,
    benchmark_single_samples,
    benchmark_million_samples,
    benchmark_hash_roll,
);

criterion_main!(benches);
