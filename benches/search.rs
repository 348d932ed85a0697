//! Benchmarks for index construction and query paths.
//!
//! Measures the fit/query costs that dominate real workloads, with the exact
//! scan as the baseline the approximate indexes must beat.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use proxima::{
    AnnIndex, ExactIndex, HnswIndex, HnswParams, KdTreeIndex, KdTreeParams, Metric, RpForestIndex,
    RpForestParams,
};

fn uniform_rows(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.random::<f32>()).collect())
        .collect()
}

fn fitted_indexes(rows: &[Vec<f32>]) -> Vec<(&'static str, Box<dyn AnnIndex>)> {
    let mut indexes: Vec<(&'static str, Box<dyn AnnIndex>)> = vec![
        ("exact", Box::new(ExactIndex::new(Metric::L2))),
        (
            "kdtree",
            Box::new(KdTreeIndex::new(Metric::L2, KdTreeParams::default()).unwrap()),
        ),
        (
            "rp_forest",
            Box::new(
                RpForestIndex::new(
                    Metric::L2,
                    RpForestParams {
                        num_trees: 20,
                        leaf_size: 40,
                        seed: Some(42),
                    },
                )
                .unwrap(),
            ),
        ),
        (
            "hnsw",
            Box::new(
                HnswIndex::new(
                    Metric::L2,
                    HnswParams {
                        seed: Some(42),
                        ..HnswParams::default()
                    },
                )
                .unwrap(),
            ),
        ),
    ];
    for (_, index) in &mut indexes {
        index.fit(rows).unwrap();
    }
    indexes
}

fn bench_knn_query(c: &mut Criterion) {
    let rows = uniform_rows(10_000, 16, 7);
    let queries = uniform_rows(64, 16, 8);
    let indexes = fitted_indexes(&rows);

    let mut group = c.benchmark_group("knn_query");
    for (name, index) in &indexes {
        group.bench_with_input(BenchmarkId::new(*name, 10), index, |b, index| {
            let mut cursor = 0;
            b.iter(|| {
                cursor = (cursor + 1) % queries.len();
                black_box(index.knn_query(&queries[cursor], 10).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let rows = uniform_rows(2_000, 16, 9);

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    group.bench_function("kdtree", |b| {
        b.iter(|| {
            let mut index = KdTreeIndex::new(Metric::L2, KdTreeParams::default()).unwrap();
            index.fit(black_box(&rows)).unwrap();
            index
        });
    });
    group.bench_function("rp_forest", |b| {
        b.iter(|| {
            let mut index = RpForestIndex::new(
                Metric::L2,
                RpForestParams {
                    num_trees: 20,
                    leaf_size: 40,
                    seed: Some(42),
                },
            )
            .unwrap();
            index.fit(black_box(&rows)).unwrap();
            index
        });
    });
    group.bench_function("hnsw", |b| {
        b.iter(|| {
            let mut index = HnswIndex::new(
                Metric::L2,
                HnswParams {
                    seed: Some(42),
                    ..HnswParams::default()
                },
            )
            .unwrap();
            index.fit(black_box(&rows)).unwrap();
            index
        });
    });
    group.finish();
}

criterion_group!(benches, bench_knn_query, bench_fit);
criterion_main!(benches);
