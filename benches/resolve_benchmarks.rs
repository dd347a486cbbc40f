//! Performance benchmarks for lazy resolution.
//!
//! Every iteration resolves a freshly registered set of units, since phase
//! markers make a second resolve of the same declaration free.
//!
//! - Single target: one method of a large file, the lazy fast case
//! - Whole file: every member to `BodyResolve`
//! - Hierarchies: deep inheritance chains and supertype cycles
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- "whole_file"
//! ```

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use phasewise::prelude::*;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

/// Initialize puffin profiler.
#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of each benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

struct Workload {
    resolver: Resolver,
    unit: Arc<CompilationUnit>,
    members: Vec<DeclId>,
}

/// `classes` classes, each extending the previous one and declaring
/// `methods` methods with one parameter and an inferred return type.
fn create_workload(classes: usize, methods: usize) -> Workload {
    let registry = Arc::new(SymbolRegistry::with_builtins());
    let mut b = UnitBuilder::new("bench.kt", "bench");
    let mut members = Vec::with_capacity(classes * methods);
    for c in 0..classes {
        let mut spec = DeclSpec::class(&format!("C{c}")).with_flags(DeclFlags::OPEN);
        if c > 0 {
            spec = spec.with_supertype(TypeExpr::named(format!("C{}", c - 1)));
        }
        let class = b.add(DeclId::ROOT, spec);
        for m in 0..methods {
            let f = b.add(
                class,
                DeclSpec::function(&format!("m{m}")).with_expression_body(TypeExpr::named("Int")),
            );
            b.add(f, DeclSpec::parameter("x", TypeExpr::named(format!("C{c}"))));
            members.push(f);
        }
    }
    let unit = registry.add_unit(b).unwrap();
    let resolver = Resolver::new(registry, ResolverConfig::default());
    Workload {
        resolver,
        unit,
        members,
    }
}

/// A ring of `len` classes, each extending the next.
fn create_cycle(len: usize) -> (Resolver, SymbolRef) {
    let registry = Arc::new(SymbolRegistry::with_builtins());
    let mut b = UnitBuilder::new("ring.kt", "ring");
    let mut first = DeclId::ROOT;
    for i in 0..len {
        let next = format!("R{}", (i + 1) % len);
        let id = b.add(
            DeclId::ROOT,
            DeclSpec::class(&format!("R{i}")).with_supertype(TypeExpr::named(next)),
        );
        if i == 0 {
            first = id;
        }
    }
    let unit = registry.add_unit(b).unwrap();
    let symbol = unit.symbol(first);
    (Resolver::new(registry, ResolverConfig::default()), symbol)
}

/// One member of a large file; the rest must stay untouched.
fn single_target_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("single_target");

    for (classes, methods) in [(10, 10), (50, 20), (200, 20)] {
        let name = format!("types_{classes}x{methods}");
        group.bench_function(&name, |b| {
            b.iter_batched(
                || create_workload(classes, methods),
                |w| {
                    let target = w.unit.symbol(w.members[w.members.len() / 2]);
                    w.resolver.resolve(target, Phase::Types, false).unwrap();
                    black_box(w.resolver.stats().total_invocations())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Every member of a file to the last phase.
fn whole_file_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("whole_file");

    for (classes, methods) in [(10, 10), (50, 20)] {
        group.throughput(Throughput::Elements((classes * methods) as u64));
        let name = format!("body_{classes}x{methods}");
        group.bench_function(&name, |b| {
            b.iter_batched(
                || create_workload(classes, methods),
                |w| {
                    for id in &w.members {
                        w.resolver
                            .resolve(w.unit.symbol(*id), Phase::BodyResolve, false)
                            .unwrap();
                    }
                    end_profiling_frame();
                    black_box(w.resolver.stats().total_invocations())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Supertype sessions over deep chains and cycles.
fn hierarchy_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("hierarchy");

    for depth in [10, 100, 500] {
        group.bench_function(format!("chain_{depth}"), |b| {
            b.iter_batched(
                || create_workload(depth, 0),
                |w| {
                    let deepest = w.unit.symbol(DeclId::new(depth as u32));
                    w.resolver.resolve(deepest, Phase::SuperTypes, false).unwrap();
                    black_box(w.resolver.stats().snapshot().supertype_rounds)
                },
                BatchSize::SmallInput,
            );
        });
    }

    for len in [2, 50] {
        group.bench_function(format!("cycle_{len}"), |b| {
            b.iter_batched(
                || create_cycle(len),
                |(resolver, symbol)| {
                    resolver.resolve(symbol, Phase::SuperTypes, false).unwrap();
                    black_box(resolver.stats().snapshot().supertype_rounds)
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    single_target_benchmarks,
    whole_file_benchmarks,
    hierarchy_benchmarks
);
criterion_main!(benches);
