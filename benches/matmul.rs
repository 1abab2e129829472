//! Matrix Multiplication Benchmark Comparison
//!
//! Compares task-parallel Strassen, serial Strassen, divide-and-conquer,
//! tiled, hybrid and ndarray across matrix sizes.
//!
//! # Usage:
//! ```bash
//! # Run all matrix multiplication benchmarks
//! cargo bench --bench matmul
//!
//! # Run specific benchmark group
//! cargo bench --bench matmul -- matmul_512
//! cargo bench --bench matmul -- strassen_max_depth
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;

use hybrid_strassen::distributed::run_hybrid_local;
use hybrid_strassen::utils::random_matrix;
use hybrid_strassen::{divide_conquer, tiled, Matrix, RayonScheduler, SerialStrassen, Strassen, StrassenConfig};

const THRESHOLD: usize = 64;

/// Benchmark all implementations for a specific size - one group per size
fn bench_matmul_by_size(c: &mut Criterion) {
    let sizes = [128, 256, 512];

    for n in sizes {
        let mut group = c.benchmark_group(format!("matmul_{n}"));
        group.sample_size(10);

        let a = random_matrix::<f32>(n, 123);
        let b = random_matrix::<f32>(n, 456);
        let config = StrassenConfig::new().with_threshold(THRESHOLD).with_max_depth(2);

        let engine = Strassen::new(config).unwrap();
        group.bench_function("strassen_parallel", |bench| {
            bench.iter(|| engine.multiply(black_box(&a), black_box(&b)).unwrap())
        });

        let mut serial = SerialStrassen::new(THRESHOLD).unwrap();
        group.bench_function("strassen_serial", |bench| {
            bench.iter(|| serial.multiply(black_box(&a), black_box(&b)).unwrap())
        });

        let scheduler = RayonScheduler::new(None).unwrap();
        group.bench_function("divide_conquer", |bench| {
            bench.iter(|| {
                let mut out = Matrix::zeros(n);
                divide_conquer::multiply(a.view(), b.view(), out.view_mut(), THRESHOLD, &scheduler).unwrap();
                out
            })
        });

        group.bench_function("tiled", |bench| {
            bench.iter(|| tiled::par_multiply(black_box(&a), black_box(&b), THRESHOLD, &scheduler).unwrap())
        });

        group.bench_function("hybrid", |bench| {
            bench.iter(|| run_hybrid_local(&config, black_box(&a), black_box(&b)).unwrap())
        });

        let a_nd: Array2<f32> = a.clone().into_array();
        let b_nd: Array2<f32> = b.clone().into_array();
        group.bench_function("ndarray", |bench| bench.iter(|| black_box(&a_nd).dot(black_box(&b_nd))));

        group.finish();
    }
}

/// Same problem, varying the depth at which forking stops.
fn bench_max_depth(c: &mut Criterion) {
    let n = 512;
    let a = random_matrix::<f32>(n, 1);
    let b = random_matrix::<f32>(n, 2);
    let mut group = c.benchmark_group("strassen_max_depth");
    group.sample_size(10);

    for max_depth in [0, 1, 2, 3] {
        let engine = Strassen::new(
            StrassenConfig::new()
                .with_threshold(THRESHOLD)
                .with_max_depth(max_depth),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(max_depth), &max_depth, |bench, _| {
            bench.iter(|| engine.multiply(black_box(&a), black_box(&b)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matmul_by_size, bench_max_depth);
criterion_main!(benches);
