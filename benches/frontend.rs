mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use monkey::{lexer, parser};

fn bench_frontend(c: &mut Criterion) {
    for workload in common::workloads() {
        let source = workload.source;
        let tokens = lexer::tokenize(&source);

        c.bench_function(&format!("frontend_tokenize_{}", workload.label), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(&source));
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_parse_only_{}", workload.label), |b| {
            b.iter(|| {
                let out = parser::parse_tokens(black_box(tokens.clone()));
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_tokenize_parse_{}", workload.label), |b| {
            b.iter(|| {
                let out = parser::parse_tokens(lexer::tokenize(black_box(&source)));
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
