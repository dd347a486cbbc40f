//! Restricted traversal shared by every phase.
//!
//! The walk starts at the compilation unit root and only descends into
//! declarations on the designation path. Everything else is opaque: it is
//! neither visited nor has its phase touched.
//!
//! ```text
//! file
//! ├── class A          path member: header only
//! │   ├── fun sibling  opaque
//! │   └── fun target   target: transformed with all of its members
//! │       └── param x  transformed (part of the target)
//! └── class B          opaque
//! ```
//!
//! After the walk the target must have been visited exactly once. Anything
//! else means the designation does not describe the tree, which is an
//! internal fault and panics.

use tracing::trace;

use phasewise_core::{
    CompilationUnit, DeclId, DeclKind, Phase, ResolveError, UnitLockGuard,
};
use phasewise_registry::SymbolProvider;

use crate::designation::Designation;
use crate::extension::{PhaseExtension, TypeInference};
use crate::scope::TypeScope;
use crate::{ResolveStats, ResolverConfig};

/// Everything a phase may use while the unit lock is held.
pub struct TransformContext<'a> {
    pub provider: &'a dyn SymbolProvider,
    pub unit: &'a CompilationUnit,
    pub guard: &'a UnitLockGuard<'a>,
    pub config: &'a ResolverConfig,
    pub scope: TypeScope<'a>,
    pub inference: &'a dyn TypeInference,
    pub extensions: &'a [std::sync::Arc<dyn PhaseExtension>],
    pub stats: &'a ResolveStats,
    /// Present when the resolve is cancellable.
    pub cancellation: Option<&'a phasewise_core::CancellationToken>,
}

impl TransformContext<'_> {
    pub fn check_cancelled(&self, phase: Phase) -> Result<(), ResolveError> {
        match self.cancellation {
            Some(token) => token.check(phase),
            None => Ok(()),
        }
    }

    /// Fail with `UnexpectedDeclarationKind` for `decl`.
    pub fn unexpected(&self, decl: DeclId, phase: Phase) -> ResolveError {
        ResolveError::UnexpectedDeclarationKind {
            symbol: self.unit.symbol(decl),
            kind: self.unit.get(decl).kind,
            phase,
        }
    }
}

/// Per-declaration work of one phase.
pub trait DeclTransformer {
    fn phase(&self) -> Phase;

    /// Header work on an enclosing declaration of the target.
    fn transform_path_member(
        &mut self,
        _ctx: &TransformContext<'_>,
        _decl: DeclId,
    ) -> Result<(), ResolveError> {
        Ok(())
    }

    /// Full work on the target or one of its members.
    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError>;

    /// Whether declarations inside executable code are part of the walk.
    fn descend_into_bodies(&self) -> bool {
        false
    }

    /// Work after the walk, before phase markers are committed.
    fn finish(&mut self, _ctx: &TransformContext<'_>) -> Result<(), ResolveError> {
        Ok(())
    }
}

/// Declarations touched by a walk, committed only when the whole phase
/// succeeded.
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Own phase only.
    pub headers: Vec<DeclId>,
    /// Own and subtree phase.
    pub members: Vec<DeclId>,
}

impl WalkResult {
    /// Raise the phase markers of everything visited.
    pub fn commit(&self, unit: &CompilationUnit, phase: Phase, guard: &UnitLockGuard<'_>) {
        for id in &self.headers {
            unit.raise_phase(*id, phase, guard);
        }
        for id in &self.members {
            unit.raise_phase(*id, phase, guard);
            unit.raise_subtree_phase(*id, phase, guard);
        }
    }
}

/// Walks one designation.
pub struct DesignationWalker<'d> {
    designation: &'d Designation,
    target_visits: usize,
    result: WalkResult,
}

impl<'d> DesignationWalker<'d> {
    pub fn new(designation: &'d Designation) -> Self {
        Self {
            designation,
            target_visits: 0,
            result: WalkResult::default(),
        }
    }

    pub fn walk(
        mut self,
        transformer: &mut dyn DeclTransformer,
        ctx: &TransformContext<'_>,
    ) -> Result<WalkResult, ResolveError> {
        self.visit_children(DeclId::ROOT, transformer, ctx)?;
        self.ensure_designation_passed();
        Ok(self.result)
    }

    fn visit_children(
        &mut self,
        parent: DeclId,
        transformer: &mut dyn DeclTransformer,
        ctx: &TransformContext<'_>,
    ) -> Result<(), ResolveError> {
        let unit = ctx.unit;
        for child in &unit.get(parent).children {
            let child = *child;
            if child == self.designation.target {
                self.visit_target(child, transformer, ctx)?;
            } else if self.designation.on_path(child) {
                self.visit_path_member(child, transformer, ctx)?;
                self.visit_children(child, transformer, ctx)?;
            }
        }
        Ok(())
    }

    fn visit_path_member(
        &mut self,
        id: DeclId,
        transformer: &mut dyn DeclTransformer,
        ctx: &TransformContext<'_>,
    ) -> Result<(), ResolveError> {
        let phase = transformer.phase();
        trace!(decl = %ctx.unit.symbol(id), %phase, "path member");
        transformer.transform_path_member(ctx, id)?;
        run_extensions(ctx, phase, id)?;
        self.result.headers.push(id);

        // Type parameters belong to the header of their owner.
        for child in &ctx.unit.get(id).children {
            if ctx.unit.get(*child).kind == DeclKind::TypeParameter {
                transformer.transform_declaration(ctx, *child)?;
                run_extensions(ctx, phase, *child)?;
                self.result.members.push(*child);
            }
        }
        Ok(())
    }

    fn visit_target(
        &mut self,
        id: DeclId,
        transformer: &mut dyn DeclTransformer,
        ctx: &TransformContext<'_>,
    ) -> Result<(), ResolveError> {
        self.target_visits += 1;
        self.visit_member(id, transformer, ctx)
    }

    fn visit_member(
        &mut self,
        id: DeclId,
        transformer: &mut dyn DeclTransformer,
        ctx: &TransformContext<'_>,
    ) -> Result<(), ResolveError> {
        let phase = transformer.phase();
        let decl = ctx.unit.get(id);
        if decl.kind == DeclKind::File {
            return Err(ctx.unexpected(id, phase));
        }
        if decl.phase() < phase {
            trace!(decl = %ctx.unit.symbol(id), %phase, "transform");
            transformer.transform_declaration(ctx, id)?;
            run_extensions(ctx, phase, id)?;
        }
        self.result.members.push(id);

        let descend_into_bodies = transformer.descend_into_bodies();
        for child in &decl.children {
            let member = ctx.unit.get(*child);
            if !member.origin.is_available_for_resolve()
                || (member.is_local && !descend_into_bodies)
                || member.subtree_phase() >= phase
            {
                continue;
            }
            self.visit_member(*child, transformer, ctx)?;
        }
        Ok(())
    }

    fn ensure_designation_passed(&self) {
        assert_eq!(
            self.target_visits,
            1,
            "designation target {} visited {} times",
            self.designation.symbol(),
            self.target_visits
        );
    }
}

fn run_extensions(ctx: &TransformContext<'_>, phase: Phase, id: DeclId) -> Result<(), ResolveError> {
    let decl = ctx.unit.get(id);
    for extension in ctx.extensions {
        extension.on_phase(phase, ctx.unit, decl, ctx.guard)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use phasewise_core::{DeclSpec, TypeExpr, UnitBuilder};
    use phasewise_registry::SymbolRegistry;

    use crate::designation::DesignationBuilder;
    use crate::extension::DefaultInference;

    /// Records what it was asked to do.
    #[derive(Default)]
    struct Recorder {
        headers: Vec<DeclId>,
        members: Vec<DeclId>,
    }

    impl DeclTransformer for Recorder {
        fn phase(&self) -> Phase {
            Phase::Types
        }

        fn transform_path_member(
            &mut self,
            _ctx: &TransformContext<'_>,
            decl: DeclId,
        ) -> Result<(), ResolveError> {
            self.headers.push(decl);
            Ok(())
        }

        fn transform_declaration(
            &mut self,
            _ctx: &TransformContext<'_>,
            decl: DeclId,
        ) -> Result<(), ResolveError> {
            self.members.push(decl);
            Ok(())
        }
    }

    fn walk_with<T: DeclTransformer>(
        registry: &SymbolRegistry,
        designation: &Designation,
        transformer: &mut T,
    ) -> WalkResult {
        let unit = &designation.unit;
        let guard = unit.lock().lock();
        let config = ResolverConfig::default();
        let stats = ResolveStats::new();
        let ctx = TransformContext {
            provider: registry,
            unit,
            guard: &guard,
            config: &config,
            scope: TypeScope::new(registry, unit, &config.default_imports),
            inference: &DefaultInference,
            extensions: &[],
            stats: &stats,
            cancellation: None,
        };
        DesignationWalker::new(designation)
            .walk(transformer, &ctx)
            .unwrap()
    }

    #[test]
    fn walk_visits_only_path_and_target() {
        let registry = SymbolRegistry::new();
        // class A<T> { fun sibling(); fun target(x: Int) { val local } }
        // class B
        let mut b = UnitBuilder::new("a.kt", "p");
        let a = b.add(DeclId::ROOT, DeclSpec::class("A"));
        let t = b.add(a, DeclSpec::type_parameter("T"));
        b.add(a, DeclSpec::function("sibling"));
        let target = b.add(a, DeclSpec::function("target"));
        let x = b.add(target, DeclSpec::parameter("x", TypeExpr::named("Int")));
        b.add_local(target, DeclSpec::local_variable("local"));
        b.add(DeclId::ROOT, DeclSpec::class("B"));
        let unit = registry.add_unit(b).unwrap();

        let designation = DesignationBuilder::designate(Arc::clone(&unit), target).unwrap();
        let mut recorder = Recorder::default();
        let result = walk_with(&registry, &designation, &mut recorder);

        assert_eq!(recorder.headers, vec![a]);
        assert_eq!(recorder.members, vec![t, target, x]);
        assert_eq!(result.headers, vec![a]);
        assert_eq!(result.members, vec![t, target, x]);
    }

    #[test]
    #[should_panic(expected = "visited 0 times")]
    fn walk_panics_when_target_is_missed() {
        let registry = SymbolRegistry::new();
        let mut b = UnitBuilder::new("a.kt", "p");
        let a = b.add(DeclId::ROOT, DeclSpec::class("A"));
        let f = b.add(a, DeclSpec::function("f"));
        let unit = registry.add_unit(b).unwrap();

        // A designation whose path skips the owner of the target.
        let designation = Designation {
            unit,
            path: Vec::new(),
            target: f,
            is_local: false,
        };
        walk_with(&registry, &designation, &mut Recorder::default());
    }
}
