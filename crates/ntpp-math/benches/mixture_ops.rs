//! Criterion benchmarks for `ntpp-math`.
//!
//! Focus on the per-timestep mixture kernels evaluated inside loss and grid loops.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ntpp_math::WeibullMixture;

fn bench_mixture_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("weibull_mixture");

    for k in [1usize, 4, 16] {
        let raw: Vec<f64> = (0..3 * k).map(|i| ((i as f64) * 0.37).sin()).collect();
        let mix = WeibullMixture::from_raw(&raw).expect("valid raw width");

        group.bench_with_input(BenchmarkId::new("from_raw", k), &raw, |b, raw| {
            b.iter(|| black_box(WeibullMixture::from_raw(black_box(raw))));
        });

        group.bench_with_input(BenchmarkId::new("log_density", k), &mix, |b, mix| {
            b.iter(|| black_box(mix.log_density(black_box(3.7))));
        });

        group.bench_with_input(BenchmarkId::new("log_hazard", k), &mix, |b, mix| {
            b.iter(|| black_box(mix.log_hazard(black_box(3.7))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mixture_kernels);
criterion_main!(benches);
