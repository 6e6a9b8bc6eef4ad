//! Benchmarks for method body import.
//!
//! Measures the full pipeline (leaders, blocks, guards, translation, merges)
//! on synthetic methods of three shapes:
//! - straight-line arithmetic
//! - branchy code with many merge points
//! - nested exception regions

extern crate cilgraph;

use cilgraph::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// A long straight-line method: ldc/add chains ending in ret.
fn straight_line(length: usize) -> MethodSource {
    let mut ops = vec![RawOp::LdcI4(0)];
    for i in 0..length {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        ops.push(RawOp::LdcI4(i as i32));
        ops.push(RawOp::Binary {
            op: BinaryOp::Add,
            checked: false,
            unsigned: false,
        });
    }
    ops.push(RawOp::Ret);
    MethodSource::from_ops(ops)
        .with_max_stack(4)
        .returning(StackKind::Int32)
}

/// A chain of diamonds, each arm pushing a value merged at the join.
fn diamond_chain(count: usize) -> MethodSource {
    let mut ops = Vec::new();
    for _ in 0..count {
        #[allow(clippy::cast_possible_truncation)]
        let base = ops.len() as u32;
        ops.push(RawOp::LdcI4(1));
        ops.push(RawOp::Brcond {
            condition: Condition::True,
            unsigned: false,
            target: base + 4,
        });
        ops.push(RawOp::LdcI4(0));
        ops.push(RawOp::Br(base + 5));
        ops.push(RawOp::LdcI4(1));
        ops.push(RawOp::Stloc(0));
    }
    ops.push(RawOp::Ret);
    MethodSource::from_ops(ops).with_locals(&[StackKind::Int32])
}

/// Nested finally regions around a trivial body.
fn nested_finally(depth: usize) -> MethodSource {
    // depth finallys: try blocks nest at the front, handlers trail
    let mut ops = Vec::new();
    #[allow(clippy::cast_possible_truncation)]
    let ret_offset = (depth * 2) as u32;
    for _ in 0..depth {
        ops.push(RawOp::Leave(ret_offset));
    }
    for _ in 0..depth {
        ops.push(RawOp::EndFinally);
    }
    ops.push(RawOp::Ret);

    let mut regions = Vec::new();
    for level in 0..depth {
        #[allow(clippy::cast_possible_truncation)]
        let (d, l) = (depth as u32, level as u32);
        regions.push(ExceptionRegion::finally(l, d, d + l, d + l + 1));
    }
    // innermost first
    regions.reverse();
    MethodSource::from_ops(ops).with_regions(regions)
}

fn bench_straight_line(c: &mut Criterion) {
    let source = straight_line(1000);
    c.bench_function("import_straight_line_1000", |b| {
        b.iter(|| {
            let body = cilgraph::import(black_box(&source)).unwrap();
            black_box(body)
        });
    });
}

fn bench_diamond_chain(c: &mut Criterion) {
    let source = diamond_chain(200);
    c.bench_function("import_diamond_chain_200", |b| {
        b.iter(|| {
            let body = cilgraph::import(black_box(&source)).unwrap();
            black_box(body)
        });
    });
}

fn bench_nested_finally(c: &mut Criterion) {
    let source = nested_finally(32);
    c.bench_function("import_nested_finally_32", |b| {
        b.iter(|| {
            let body = cilgraph::import(black_box(&source)).unwrap();
            black_box(body)
        });
    });
}

criterion_group!(
    benches,
    bench_straight_line,
    bench_diamond_chain,
    bench_nested_finally
);
criterion_main!(benches);
