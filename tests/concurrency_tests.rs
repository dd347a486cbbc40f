//! Resolution from many threads at once.
//!
//! Units are guarded by their own locks; these tests check that concurrent
//! requests neither duplicate phase work nor deadlock on each other.

mod common;

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use phasewise::prelude::*;

use common::{create_shapes, create_test_resolver};

const THREADS: usize = 8;

#[test]
fn test_same_target_runs_each_phase_once() {
    let (registry, resolver) = create_test_resolver();
    let shapes = create_shapes(&registry);
    let symbol = shapes.unit.symbol(shapes.circle_area);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                resolver.resolve(symbol, Phase::BodyResolve, false).unwrap();
            });
        }
    });

    let stats = resolver.stats().snapshot();
    for phase in Phase::ALL {
        let expected = u64::from(phase > Phase::LAST_NON_LAZY && !phase.is_extension());
        assert_eq!(stats.invocations(phase), expected, "{phase}");
    }
    assert_eq!(shapes.unit.get(shapes.circle_area).phase(), Phase::BodyResolve);
    assert!(stats.already_resolved >= (THREADS - 1) as u64);
}

#[test]
fn test_cross_unit_supertype_cycle_does_not_deadlock() {
    for _ in 0..20 {
        let (registry, resolver) = create_test_resolver();
        // a.kt: class A : B    b.kt: class B : A
        let mut a = UnitBuilder::new("a.kt", "a");
        a.import(ImportDirective::explicit("b.B"));
        let class_a = a.add(DeclId::ROOT, DeclSpec::class("A").with_supertype(TypeExpr::named("B")));
        let mut b = UnitBuilder::new("b.kt", "b");
        b.import(ImportDirective::explicit("a.A"));
        let class_b = b.add(DeclId::ROOT, DeclSpec::class("B").with_supertype(TypeExpr::named("A")));
        let unit_a = registry.add_unit(a).unwrap();
        let unit_b = registry.add_unit(b).unwrap();
        let symbol_a = unit_a.symbol(class_a);
        let symbol_b = unit_b.symbol(class_b);
        let barrier = Barrier::new(2);

        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                resolver.resolve(symbol_a, Phase::Types, false).unwrap();
            });
            s.spawn(|| {
                barrier.wait();
                resolver.resolve(symbol_b, Phase::Types, false).unwrap();
            });
        });

        let supers_a = unit_a.get(class_a).slots().supertypes.clone();
        let supers_b = unit_b.get(class_b).slots().supertypes.clone();
        let points_at = |slots: &[TypeSlot], target: SymbolRef| {
            slots
                .iter()
                .any(|slot| slot.resolved().and_then(ResolvedType::class_symbol) == Some(target))
        };
        assert!(
            !(points_at(&supers_a, symbol_b) && points_at(&supers_b, symbol_a)),
            "cycle survived: {supers_a:?} / {supers_b:?}"
        );
        assert!(supers_a.iter().chain(&supers_b).all(TypeSlot::is_resolved));
    }
}

#[test]
fn test_mixed_requests_reach_their_phases() {
    let (registry, resolver) = create_test_resolver();
    let shapes = create_shapes(&registry);
    let unit = &shapes.unit;
    let requests = [
        (shapes.area, Phase::Status),
        (shapes.circle_area, Phase::BodyResolve),
        (shapes.describe, Phase::ImplicitTypesBodyResolve),
        (shapes.radius, Phase::Types),
        (shapes.circle, Phase::Contracts),
        (shapes.shape, Phase::SuperTypes),
    ];
    let barrier = Barrier::new(requests.len() * 2);

    thread::scope(|s| {
        for round in 0..2 {
            for (id, phase) in requests {
                let barrier = &barrier;
                let resolver = &resolver;
                s.spawn(move || {
                    barrier.wait();
                    let symbol = unit.symbol(id);
                    if round == 0 {
                        resolver.resolve(symbol, phase, false).unwrap();
                    } else {
                        resolver.resolve(symbol, phase, true).unwrap();
                    }
                });
            }
        }
    });

    for (id, phase) in requests {
        assert!(
            resolver.is_at_least(unit.symbol(id), phase),
            "{} below {phase}",
            unit.symbol(id)
        );
    }
    let inferred = unit.get(shapes.describe).slots().return_type.clone();
    assert!(inferred.is_resolved());
}

#[test]
fn test_cancelled_while_waiting_for_lock() {
    let (registry, resolver) = create_test_resolver();
    let shapes = create_shapes(&registry);
    let symbol = shapes.unit.symbol(shapes.circle_area);
    let guard = shapes.unit.lock().lock();

    let result = thread::scope(|s| {
        let waiter = s.spawn(|| resolver.resolve(symbol, Phase::Types, true));
        thread::sleep(Duration::from_millis(50));
        resolver.cancellation().cancel();
        waiter.join().unwrap()
    });
    drop(guard);

    assert_eq!(
        result,
        Err(ResolveError::Cancelled {
            phase: Phase::Types
        })
    );
    assert_eq!(shapes.unit.get(shapes.circle_area).phase(), Phase::Raw);

    // Non-cancellable requests ignore the token.
    resolver.resolve(symbol, Phase::Types, false).unwrap();
    assert_eq!(shapes.unit.get(shapes.circle_area).phase(), Phase::Types);
}
