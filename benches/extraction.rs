//! Benchmarks for query splitting and expression extraction.
//!
//! Benchmark targets:
//! - Notation normalization: <50us
//! - Splitting a multi-part query: <200us
//! - Full query parsing: <1ms

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use quantix::extract::{extract_equations, extract_expression, normalize_notation};
use quantix::services::parse_query;
use quantix::split_into_sub_problems;

const SIMPLE_QUERY: &str = "derivative of x^2";
const NOTATION_QUERY: &str = "Find ∂/∂x of 3x² · y + √(x) − 2";
const SYSTEM_QUERY: &str = "Solve 2x + y = 5, x - y = 1";
const MULTI_PART_QUERY: &str = "Find the derivative of x^3 + 2x. Compute the gradient of x^2 + y^2 at (1, 2). \
    Solve x + y = 3, x - y = 1.\nFind the minimum of x^2 - 4x + 1; evaluate the hessian of x^2*y + y^3";

fn bench_normalize_notation(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_notation");

    group.bench_function("ascii", |b| {
        b.iter(|| normalize_notation(black_box(SIMPLE_QUERY)));
    });
    group.bench_function("unicode", |b| {
        b.iter(|| normalize_notation(black_box(NOTATION_QUERY)));
    });

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");

    group.bench_function("expression", |b| {
        b.iter(|| extract_expression(black_box("Find the derivative of x^3 + 2x")));
    });
    group.bench_function("equations", |b| {
        b.iter(|| extract_equations(black_box(SYSTEM_QUERY)));
    });

    group.finish();
}

fn bench_splitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_into_sub_problems");
    group.measurement_time(Duration::from_secs(5));

    for repeat in [1usize, 10, 50] {
        let text = vec![MULTI_PART_QUERY; repeat].join("\n");
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("multi_part", repeat), &text, |b, text| {
            b.iter(|| split_into_sub_problems(black_box(text)));
        });
    }

    group.finish();
}

fn bench_parse_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_query");

    group.bench_function("single", |b| {
        b.iter(|| parse_query(black_box(SIMPLE_QUERY)));
    });
    group.bench_function("multi_part", |b| {
        b.iter(|| parse_query(black_box(MULTI_PART_QUERY)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_normalize_notation,
    bench_extraction,
    bench_splitting,
    bench_parse_query
);
criterion_main!(benches);
