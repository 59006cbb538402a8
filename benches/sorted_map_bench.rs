//! Benchmark for `SortedMap` vs standard `BTreeMap`.
//!
//! Compares canopy's persistent `SortedMap` against Rust's standard mutable
//! `BTreeMap` for common operations. The persistent map pays for version
//! independence with per-operation allocation; these benchmarks show the
//! actual cost.

use canopy::SortedMap;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::BTreeMap;

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("insert");

    for size in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("SortedMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = SortedMap::new();
                    for index in 0..size {
                        map = map.insert(black_box(index), black_box(index * 2));
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("BTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = BTreeMap::new();
                    for index in 0..size {
                        map.insert(black_box(index), black_box(index * 2));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("get");

    for size in [100, 1000, 10000] {
        let persistent_map: SortedMap<i32, i32> =
            (0..size).map(|index| (index, index * 2)).collect();
        let standard_map: BTreeMap<i32, i32> = (0..size).map(|index| (index, index * 2)).collect();

        group.bench_with_input(
            BenchmarkId::new("SortedMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for key in 0..size {
                        if let Some(&value) = persistent_map.get(&black_box(key)) {
                            sum += value;
                        }
                    }
                    black_box(sum)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("BTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0;
                    for key in 0..size {
                        if let Some(&value) = standard_map.get(&black_box(key)) {
                            sum += value;
                        }
                    }
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("remove");

    for size in [100, 1000] {
        let persistent_map: SortedMap<i32, i32> =
            (0..size).map(|index| (index, index * 2)).collect();

        group.bench_with_input(
            BenchmarkId::new("SortedMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = persistent_map.clone();
                    for key in 0..size {
                        map = map.remove(&black_box(key));
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("BTreeMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map: BTreeMap<i32, i32> =
                        (0..size).map(|index| (index, index * 2)).collect();
                    for key in 0..size {
                        map.remove(&black_box(key));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// iterate Benchmark
// =============================================================================

fn benchmark_iterate(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("iterate");

    for size in [100, 1000, 10000] {
        let persistent_map: SortedMap<i32, i32> =
            (0..size).map(|index| (index, index * 2)).collect();
        let standard_map: BTreeMap<i32, i32> = (0..size).map(|index| (index, index * 2)).collect();

        group.bench_with_input(BenchmarkId::new("SortedMap", size), &size, |bencher, _| {
            bencher.iter(|| {
                let sum: i64 = persistent_map.values().map(|value| i64::from(*value)).sum();
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("BTreeMap", size), &size, |bencher, _| {
            bencher.iter(|| {
                let sum: i64 = standard_map.values().map(|value| i64::from(*value)).sum();
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_get,
    benchmark_remove,
    benchmark_iterate
);
criterion_main!(benches);
