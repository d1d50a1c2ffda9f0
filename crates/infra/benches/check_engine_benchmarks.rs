use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use stocktake_core::CheckRecordId;
use stocktake_infra::engine::InventoryCheckEngine;
use stocktake_infra::store::InMemoryCheckStore;
use stocktake_inventory::{InventoryCheckInput, StockLookup, reconcile};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn input(i: usize) -> InventoryCheckInput {
    InventoryCheckInput::new("bench", format!("L{}", i % 8), format!("M{}", i % 64), (i % 500) as i64)
}

/// Pure domain work: validation plus variance computation.
fn bench_validate_and_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain");
    let input = InventoryCheckInput::new("u1", "L1", "M1", 45);

    group.bench_function("validate", |b| {
        b.iter(|| black_box(&input).validate().unwrap());
    });

    let check = input.validate().unwrap();
    group.bench_function("reconcile_new_balance", |b| {
        b.iter(|| {
            reconcile(
                black_box(&check),
                StockLookup::NotFound,
                CheckRecordId::new(),
                Utc::now(),
            )
            .unwrap()
        });
    });

    group.finish();
}

/// One check end to end: begin, read, two writes, commit.
fn bench_process_check_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("process_check");
    group.sample_size(1000);

    group.bench_function("existing_balance", |b| {
        let engine = InventoryCheckEngine::new(InMemoryCheckStore::new());
        rt.block_on(engine.process_check(&input(0))).unwrap();
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            let check = InventoryCheckInput::new("bench", "L0", "M0", (i % 500) as i64);
            rt.block_on(engine.process_check(black_box(&check))).unwrap()
        });
    });

    group.bench_function("rejected_input", |b| {
        let engine = InventoryCheckEngine::new(InMemoryCheckStore::new());
        let bad = InventoryCheckInput::new("bench", "L0", "M0", -1);
        b.iter(|| rt.block_on(engine.process_check(black_box(&bad))).unwrap_err());
    });

    group.finish();
}

fn bench_batch_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("process_batch");

    for batch_size in [10usize, 100, 1000].iter() {
        let inputs: Vec<_> = (0..*batch_size).map(input).collect();
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &inputs, |b, inputs| {
            let engine = InventoryCheckEngine::new(InMemoryCheckStore::new());
            b.iter(|| rt.block_on(engine.process_batch(black_box(inputs))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_validate_and_reconcile,
    bench_process_check_latency,
    bench_batch_throughput
);
criterion_main!(benches);
