//! Benchmarks for wrapper creation and trap overhead.
//!
//! Run with: cargo bench -p ftui-reactive --bench wrap_bench

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ftui_reactive::{NoopTracker, RawObject, ReactiveConfig, Reactivity, Value};

fn context() -> Reactivity {
    Reactivity::builder()
        .config(ReactiveConfig::production())
        .tracker(Rc::new(NoopTracker))
        .build()
}

// =============================================================================
// Wrapping
// =============================================================================

fn bench_wrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrap");
    let rx = context();

    let raw = Value::from(RawObject::from_entries([("a", 1), ("b", 2)]));
    let held = rx.reactive(&raw);
    group.bench_function("reactive_cache_hit", |b| {
        b.iter(|| black_box(rx.reactive(black_box(&raw))))
    });
    group.bench_function("reactive_of_wrapper", |b| {
        b.iter(|| black_box(rx.reactive(black_box(&held))))
    });
    group.bench_function("readonly_redirect", |b| {
        b.iter(|| black_box(rx.readonly(black_box(&held))))
    });
    group.bench_function("create_and_release", |b| {
        b.iter(|| {
            let fresh = Value::from(RawObject::record());
            black_box(rx.reactive(&fresh))
        })
    });

    group.finish();
}

// =============================================================================
// Traps
// =============================================================================

fn bench_traps(c: &mut Criterion) {
    let mut group = c.benchmark_group("traps");
    let rx = context();
    let w = rx.reactive(&Value::from(RawObject::from_entries([("count", 0)])));

    group.bench_function("tracked_get", |b| b.iter(|| black_box(w.get("count"))));

    let mut n = 0;
    group.bench_function("notified_set", |b| {
        b.iter(|| {
            n += 1;
            black_box(w.set("count", n))
        })
    });
    group.bench_function("unchanged_set", |b| {
        b.iter(|| black_box(w.set("count", 0)))
    });

    let nested = RawObject::record();
    nested.insert("child", RawObject::record()).unwrap();
    let nw = rx.reactive(&Value::from(nested));
    let _child = nw.get("child");
    group.bench_function("nested_get_cached", |b| {
        b.iter(|| black_box(nw.get("child")))
    });

    for size in [4usize, 64] {
        let raw = RawObject::from_entries((0..size).map(|i| (format!("k{i}"), i as i32)));
        let w = rx.reactive(&Value::from(raw));
        group.bench_with_input(BenchmarkId::new("own_keys", size), &w, |b, w| {
            b.iter(|| black_box(w.own_keys()))
        });
    }

    group.finish();
}

// =============================================================================
// Refs
// =============================================================================

fn bench_refs(c: &mut Criterion) {
    let mut group = c.benchmark_group("refs");
    let rx = context();
    let r = rx.ref_value(0);

    group.bench_function("get", |b| b.iter(|| black_box(r.get())));
    group.bench_function("set", |b| b.iter(|| black_box(r.set(1))));

    group.finish();
}

criterion_group!(benches, bench_wrap, bench_traps, bench_refs);
criterion_main!(benches);
