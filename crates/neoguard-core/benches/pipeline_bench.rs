//! # Pipeline Benchmarks
//!
//! Performance benchmarks for the neoguard-core stages.
//!
//! Run with: `cargo bench -p neoguard-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use neoguard_core::{Pipeline, RawRecord, RawTable, Refiner, RiskEngine, snapshot_to_bytes};
use neoguard_core::{RecordStore, Snapshot};
use std::hint::black_box;

/// Deterministic synthetic catalog with roughly one duplicate per ten rows.
fn create_table(size: usize) -> RawTable {
    let records = (0..size)
        .map(|i| {
            let id = (i - i / 10) as i64;
            let f = i as f64;
            RawRecord::new(
                id.to_string(),
                format!("({i})"),
                0.01 + (f % 97.0) / 100.0,
                0.02 + (f % 89.0) / 50.0,
                1_000.0 + (f * 37.0) % 120_000.0,
                2_000.0 + (f * 7919.0) % 7_000_000.0,
            )
            .with_hazardous(i % 13 == 0)
        })
        .collect();
    RawTable::from_records(records)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine");
    let refiner = Refiner::default();

    for size in [100, 1000, 10000].iter() {
        let table = create_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| black_box(refiner.refine(table)));
        });
    }

    group.finish();
}

fn bench_evaluate_portfolio(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_portfolio");
    let engine = RiskEngine::default();

    for size in [100, 1000, 10000].iter() {
        let canonical = Refiner::default()
            .refine(&create_table(*size))
            .expect("refine")
            .records;
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &canonical,
            |b, canonical| {
                b.iter(|| black_box(engine.evaluate_portfolio(canonical)));
            },
        );
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    let pipeline = Pipeline::default();

    for size in [1000, 10000].iter() {
        let table = create_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| black_box(pipeline.run(table)));
        });
    }

    group.finish();
}

fn bench_snapshot_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_encode");

    for size in [1000, 10000].iter() {
        let output = Pipeline::default()
            .run(&create_table(*size))
            .expect("run");
        let mut snapshot = Snapshot::new();
        snapshot
            .replace_run(&output.canonical, &output.enriched)
            .expect("replace");

        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| black_box(snapshot_to_bytes(snapshot)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_refine,
    bench_evaluate_portfolio,
    bench_full_pipeline,
    bench_snapshot_encode,
);

criterion_main!(benches);
