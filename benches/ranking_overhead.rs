//! Ranking pipeline benchmark
//!
//! Measures the cost of the O(n²) comparison pass, dependency-graph
//! construction and each ranking methodology on simulated measurements.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench ranking_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use partial_ranker::convergence::rank_across_pairs;
use partial_ranker::dependency_graph::DependencyGraph;
use partial_ranker::measurements::{MeasurementSet, MeasurementSource};
use partial_ranker::quantile::{QuantileComparer, QuantilePair};
use partial_ranker::ranking::{Method, PartialRanker, RankingStrategy};
use partial_ranker::simulator::{MeasurementsSimulator, NormalParams};

/// Simulated objects with slowly increasing means so that neighbours overlap
fn create_measurements(objects: usize, reps: usize) -> MeasurementSet {
    let params: Vec<(String, NormalParams)> = (0..objects)
        .map(|i| (format!("variant_{}", i), NormalParams::new(1.0 + i as f64 * 0.05, 0.1)))
        .collect();
    let mut sim = MeasurementsSimulator::with_seed(params, 42).unwrap();
    sim.measure(0, reps).unwrap();
    sim.measurements().clone()
}

fn prepared_comparer(objects: usize) -> QuantileComparer {
    let mut comparer = QuantileComparer::new(create_measurements(objects, 30));
    comparer.compute_quantiles(75.0, 25.0, false).unwrap();
    comparer.compare_all().unwrap();
    comparer
}

fn bench_compare_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_all");

    for size in [50, 200, 500] {
        let measurements = create_measurements(size, 30);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut comparer = QuantileComparer::new(measurements.clone());
                comparer.compute_quantiles(75.0, 25.0, false).unwrap();
                comparer.compare_all().unwrap();
                black_box(comparer.evaluations())
            });
        });
    }

    group.finish();
}

fn bench_graph_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_graph");

    for size in [50, 200, 500] {
        let comparer = prepared_comparer(size);
        group.bench_with_input(BenchmarkId::new("build_and_reduce", size), &size, |b, _| {
            b.iter(|| {
                let mut graph = DependencyGraph::from_comparer(&comparer).unwrap();
                black_box(graph.transitive_reduction().unwrap())
            });
        });
    }

    group.finish();
}

/// Disjoint ranges: every pair is strict, so the graph is complete and the
/// reduction removes all but n - 1 edges
fn bench_dense_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_total_order");
    group.sample_size(10);

    for size in [500, 2000] {
        let set: MeasurementSet = (0..size)
            .map(|i| (format!("variant_{}", i), vec![i as f64, i as f64 + 0.5]))
            .collect();
        let mut comparer = QuantileComparer::new(set);
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        comparer.compare_all().unwrap();

        group.bench_with_input(BenchmarkId::new("build_and_reduce", size), &size, |b, _| {
            b.iter(|| {
                let mut graph = DependencyGraph::from_comparer(&comparer).unwrap();
                black_box(graph.transitive_reduction().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_ranks");
    let comparer = prepared_comparer(200);

    for method in Method::ALL {
        group.bench_function(BenchmarkId::from_parameter(method), |b| {
            b.iter(|| {
                let mut ranker = PartialRanker::new(&comparer, method);
                ranker.compute_ranks().unwrap();
                black_box(ranker.ranks().unwrap().len())
            });
        });
    }

    group.finish();
}

fn bench_mean_rank(c: &mut Criterion) {
    let measurements = create_measurements(100, 30);
    let order = measurements.objects().to_vec();
    let pairs = QuantilePair::defaults();

    c.bench_function("mean_rank_8_pairs_100_objects", |b| {
        b.iter(|| {
            let table =
                rank_across_pairs(&measurements, &order, &pairs, Method::DfgReduced, false).unwrap();
            black_box(table.mean_ranks())
        });
    });
}

criterion_group!(
    benches,
    bench_compare_all,
    bench_graph_construction,
    bench_dense_reduction,
    bench_methods,
    bench_mean_rank
);
criterion_main!(benches);
