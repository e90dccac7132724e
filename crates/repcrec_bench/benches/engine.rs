//! Transaction manager benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use repcrec_core::{EngineConfig, Timestamp, TransactionManager, VariableId};

/// Benchmark read-write transactions that commit one after another.
fn bench_serial_commits(c: &mut Criterion) {
    let mut group = c.benchmark_group("serial_commits");

    for count in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let mut tm = TransactionManager::new(&EngineConfig::default()).unwrap();
                let mut tick = 0;
                for i in 0..count {
                    let var = VariableId::new((i % 20) as u32 + 1);
                    tick += 1;
                    let id = tm.begin(&format!("T{i}"), Timestamp::new(tick)).unwrap();
                    tm.write(id, var, i as i64).unwrap();
                    tick += 1;
                    black_box(tm.commit(id, Timestamp::new(tick)).unwrap());
                }
            });
        });
    }
    group.finish();
}

/// Benchmark snapshot reads of replicated and unreplicated variables.
fn bench_snapshot_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_reads");
    group.throughput(Throughput::Elements(20));

    group.bench_function("all_variables", |b| {
        b.iter(|| {
            let mut tm = TransactionManager::new(&EngineConfig::default()).unwrap();
            let id = tm.begin("T1", Timestamp::new(1)).unwrap();
            for var in 1..=20 {
                black_box(tm.read(id, VariableId::new(var)).unwrap());
            }
        });
    });
    group.finish();
}

/// Benchmark SSI validation with many concurrent readers of one variable.
fn bench_concurrent_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_validation");

    for concurrency in [4u64, 16, 64].iter() {
        group.throughput(Throughput::Elements(*concurrency));
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    let mut tm = TransactionManager::new(&EngineConfig::default()).unwrap();
                    let mut tick = 0;
                    let mut ids = Vec::new();
                    for i in 0..concurrency {
                        tick += 1;
                        ids.push(tm.begin(&format!("T{i}"), Timestamp::new(tick)).unwrap());
                    }
                    for (i, id) in ids.iter().enumerate() {
                        tm.read(*id, VariableId::new(2)).unwrap();
                        let var = VariableId::new((i % 10) as u32 * 2 + 2);
                        tm.write(*id, var, i as i64).unwrap();
                    }
                    for id in ids {
                        tick += 1;
                        black_box(tm.commit(id, Timestamp::new(tick)).unwrap());
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_serial_commits,
    bench_snapshot_reads,
    bench_concurrent_validation,
);

criterion_main!(benches);
