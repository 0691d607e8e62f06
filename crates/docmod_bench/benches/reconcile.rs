//! Loader and reconciler benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docmod_bench::random_store;
use docmod_core::{DocumentId, JobConfig, Reconciler, SnapshotLoader};
use docmod_testkit::{diverged_document, memory_store, settled_document, Replace};

/// Benchmark loading and transforming one document.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    let transform = Replace::new("draft", "revision");
    let config = JobConfig::test("bench-output");

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = random_store(1, 5, size);
            let loader = SnapshotLoader::new(&store, &transform, &config);

            b.iter(|| {
                let loaded = loader.load(black_box(DocumentId::new(1))).unwrap();
                black_box(loaded.binding);
            });
        });
    }
    group.finish();
}

/// Benchmark planning writes for an already loaded document.
fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let transform = Replace::new("old", "new");
    let config = JobConfig::test("bench-output");

    let cases = [
        ("settled", settled_document(1)),
        ("diverged", diverged_document(1)),
    ];
    for (name, record) in cases {
        let store = memory_store(vec![record]);
        let loaded = SnapshotLoader::new(&store, &transform, &config)
            .load(DocumentId::new(1))
            .unwrap();
        let reconciler = Reconciler::new(&config);

        group.bench_function(name, |b| {
            b.iter(|| {
                let plan = reconciler.reconcile(black_box(&loaded.binding), &store).unwrap();
                black_box(plan);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load, bench_plan);
criterion_main!(benches);
