mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use monkey::backend;

fn bench_backends(c: &mut Criterion) {
    for workload in common::workloads() {
        let program = common::load_program(&workload.source);

        for backend in backend::backends() {
            let name = backend.name();

            c.bench_function(&format!("backend_{name}_prepare_{}", workload.label), |b| {
                b.iter(|| {
                    let prepared = backend.prepare(black_box(&program)).expect("prepare");
                    black_box(prepared);
                })
            });

            c.bench_function(&format!("backend_{name}_execute_prepared_{}", workload.label), |b| {
                let prepared = backend.prepare(&program).expect("prepare");
                b.iter(|| {
                    let execution = prepared.run().expect("run prepared");
                    black_box(execution);
                })
            });

            c.bench_function(&format!("backend_{name}_total_{}", workload.label), |b| {
                b.iter(|| {
                    let execution = backend.run(black_box(&program)).expect("run");
                    black_box(execution);
                })
            });
        }
    }
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
