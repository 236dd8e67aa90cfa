#![allow(dead_code)]
use std::path::Path;

use monkey::ast::Program;
use monkey::fixtures::{self, Case};
use monkey::parser;

pub struct Workload {
    pub label: String,
    pub source: String,
}

pub fn workloads() -> Vec<Workload> {
    fixtures::bench_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load bench cases: {err:#}"))
        .iter()
        .map(|case: &Case| Workload {
            label: case.name.clone(),
            source: case
                .source()
                .unwrap_or_else(|err| panic!("read {}: {err:#}", case.name)),
        })
        .collect()
}

pub fn load_program(source: &str) -> Program {
    let (program, errors) = parser::parse(source);
    assert!(errors.is_empty(), "bench program has syntax errors: {errors:?}");
    program
}
