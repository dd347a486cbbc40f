//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use phasewise::prelude::*;

/// A registry with builtins and a resolver over it.
pub fn create_test_resolver() -> (Arc<SymbolRegistry>, Resolver) {
    let registry = Arc::new(SymbolRegistry::with_builtins());
    let config = ResolverConfig::default().with_invariant_checks(true);
    let resolver = Resolver::new(registry.clone(), config);
    (registry, resolver)
}

/// Ids of the shapes fixture.
pub struct Shapes {
    pub unit: Arc<CompilationUnit>,
    pub shape: DeclId,
    pub area: DeclId,
    pub circle: DeclId,
    pub radius: DeclId,
    pub circle_area: DeclId,
    pub describe: DeclId,
    pub local: DeclId,
}

/// ```text
/// package shapes
///
/// interface Shape { fun area(): Double }
///
/// class Circle(val radius: Double) : Shape {
///     override fun area(): Double { .. }
///     fun describe() = "circle"     // inferred String
///     { val local = 1 }             // inside describe
/// }
/// ```
pub fn create_shapes(registry: &SymbolRegistry) -> Shapes {
    let mut b = UnitBuilder::new("shapes.kt", "shapes");
    let shape = b.add(DeclId::ROOT, DeclSpec::interface("Shape"));
    let area = b.add(shape, DeclSpec::function("area").with_type(TypeExpr::named("Double")));

    let circle = b.add(
        DeclId::ROOT,
        DeclSpec::class("Circle").with_supertype(TypeExpr::named("Shape")),
    );
    let ctor = b.add(circle, DeclSpec::primary_constructor());
    let radius = b.add(
        ctor,
        DeclSpec::property_parameter("radius", TypeExpr::named("Double")),
    );
    let circle_area = b.add(
        circle,
        DeclSpec::function("area")
            .with_type(TypeExpr::named("Double"))
            .with_flags(DeclFlags::OVERRIDE)
            .with_block_body(),
    );
    let describe = b.add(
        circle,
        DeclSpec::function("describe").with_expression_body(TypeExpr::named("String")),
    );
    let local = b.add_local(
        describe,
        DeclSpec::local_variable("local").with_initializer(TypeExpr::named("Int")),
    );
    let unit = registry.add_unit(b).expect("shapes unit registers");
    Shapes {
        unit,
        shape,
        area,
        circle,
        radius,
        circle_area,
        describe,
        local,
    }
}
