//! The resolution driver.
//!
//! [`Resolver::resolve`] brings a declaration to a phase:
//!
//! 1. designate the declaration (promoting non-resolvable members to their
//!    owner, rejecting locals)
//! 2. return early when the phase markers already satisfy the request
//! 3. take the unit lock, resolve the file's imports if needed
//! 4. re-validate, then run every lazy core phase after the current one up
//!    to the requested phase, committing each phase only when it succeeded;
//!    extension phases are skipped and count as reached with the phase
//!    before them
//!
//! ```text
//! resolve(f, Types)
//!   Imports ─► SuperTypes ─► SealedClassInheritors ─► Types
//!   (file)      (session)       (markers only)        (walk)
//! ```

use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use phasewise_core::{
    CancellationToken, CompilationUnit, DeclId, Phase, ResolveError, SymbolRef, UnitId,
    UnitLockGuard, lock,
};
use phasewise_registry::SymbolProvider;

use crate::designation::{Designation, DesignationBuilder, reached_phase};
use crate::extension::{DefaultInference, PhaseExtension, TypeInference};
use crate::phases::imports::resolve_file_imports;
use crate::phases::transformer_builder;
use crate::phases::types::resolve_annotations;
use crate::scope::TypeScope;
use crate::transformer::{DeclTransformer, DesignationWalker, TransformContext};
use crate::{ResolveStats, ResolverConfig};

/// Lazily resolves declarations phase by phase.
///
/// A resolver is shared between threads; all state it mutates lives in the
/// declarations themselves and is guarded by the unit locks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use phasewise_core::{DeclId, DeclSpec, Phase, TypeExpr, UnitBuilder};
/// use phasewise_registry::SymbolRegistry;
/// use phasewise_resolver::{Resolver, ResolverConfig};
///
/// let registry = Arc::new(SymbolRegistry::with_builtins());
/// let mut builder = UnitBuilder::new("main.kt", "app");
/// let f = builder.add(
///     DeclId::ROOT,
///     DeclSpec::function("answer").with_type(TypeExpr::named("Int")),
/// );
/// let unit = registry.add_unit(builder).unwrap();
///
/// let resolver = Resolver::new(registry.clone(), ResolverConfig::default());
/// resolver.resolve(unit.symbol(f), Phase::Types, false).unwrap();
/// assert!(unit.get(f).slots().return_type.is_resolved());
/// ```
pub struct Resolver {
    provider: Arc<dyn SymbolProvider>,
    config: ResolverConfig,
    extensions: Vec<Arc<dyn PhaseExtension>>,
    inference: Arc<dyn TypeInference>,
    cancellation: CancellationToken,
    stats: ResolveStats,
}

impl Resolver {
    pub fn new(provider: Arc<dyn SymbolProvider>, config: ResolverConfig) -> Self {
        Self {
            provider,
            config,
            extensions: Vec::new(),
            inference: Arc::new(DefaultInference),
            cancellation: CancellationToken::new(),
            stats: ResolveStats::new(),
        }
    }

    /// Register a hook run for every declaration a phase processes.
    pub fn with_extension(mut self, extension: impl PhaseExtension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Replace the inference used for implicit types.
    pub fn with_inference(mut self, inference: impl TypeInference + 'static) -> Self {
        self.inference = Arc::new(inference);
        self
    }

    pub fn provider(&self) -> &Arc<dyn SymbolProvider> {
        &self.provider
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The token observed by cancellable resolves.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Bring `symbol` (and the chain of declarations it depends on) to at
    /// least `phase`.
    ///
    /// A compilation-unit root is resolved through its imports; phases
    /// beyond that only resolve the file annotations.
    ///
    /// # Errors
    ///
    /// - `LocalDeclarationUnsupported` if `symbol` is inside executable code
    /// - `ContainingUnitNotFound` / `SymbolNotFound` for unknown symbols
    /// - `Cancelled` if `cancellable` and the token was cancelled; phases
    ///   committed before the cancellation stay committed
    /// - `UnexpectedDeclarationKind` or any error raised by an extension
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(
        &self,
        symbol: SymbolRef,
        phase: Phase,
        cancellable: bool,
    ) -> Result<(), ResolveError> {
        self.stats.record_resolve_call();
        if phase == Phase::Raw {
            return Ok(());
        }
        let handle = self.provider.declaration(symbol)?;
        if !handle.origin.is_available_for_resolve() {
            return Ok(());
        }
        let designation = DesignationBuilder::designate(Arc::clone(handle.unit()), handle.id())?;
        self.resolve_designation(&designation, phase, cancellable)
    }

    /// Like [`Resolver::resolve`], but a declaration inside executable code
    /// resolves its nearest non-local container instead of failing.
    pub fn resolve_enclosing(
        &self,
        symbol: SymbolRef,
        phase: Phase,
        cancellable: bool,
    ) -> Result<(), ResolveError> {
        self.stats.record_resolve_call();
        if phase == Phase::Raw {
            return Ok(());
        }
        let handle = self.provider.declaration(symbol)?;
        if !handle.origin.is_available_for_resolve() {
            return Ok(());
        }
        let designation =
            DesignationBuilder::designate_enclosing(Arc::clone(handle.unit()), handle.id())?;
        self.resolve_designation(&designation, phase, cancellable)
    }

    /// Resolve the imports and file annotations of `unit`.
    ///
    /// # Errors
    ///
    /// `UnitNotFound` if no such unit is registered.
    pub fn resolve_imports_and_annotations(&self, unit: UnitId) -> Result<(), ResolveError> {
        let unit = self
            .provider
            .unit(unit)
            .ok_or(ResolveError::UnitNotFound { unit })?;
        let guard = unit.lock().lock();
        resolve_file_imports(self.provider.as_ref(), &unit, &guard);
        self.resolve_file_annotations(&unit, &guard, Phase::BodyResolve);
        Ok(())
    }

    /// Whether `symbol` is known to be resolved to at least `phase`.
    ///
    /// Reads phase markers only; never takes a lock. Unknown symbols are
    /// never resolved.
    pub fn is_at_least(&self, symbol: SymbolRef, phase: Phase) -> bool {
        let Ok(handle) = self.provider.declaration(symbol) else {
            return false;
        };
        if !handle.origin.is_available_for_resolve() {
            return true;
        }
        reached_phase(handle.unit(), handle.id()) >= phase
    }

    // ========================================================================
    // Driving phases
    // ========================================================================

    fn resolve_designation(
        &self,
        designation: &Designation,
        phase: Phase,
        cancellable: bool,
    ) -> Result<(), ResolveError> {
        if designation.current_phase() >= phase {
            self.stats.record_already_resolved();
            return Ok(());
        }

        let span = debug_span!("resolve", symbol = %designation.symbol(), %phase);
        let _entered = span.enter();

        let result = self.resolve_under_lock(designation, phase, cancellable);
        if let Err(error) = &result {
            if error.is_cancelled() {
                self.stats.record_cancellation();
            }
            debug!(%error, "resolve failed");
        }
        result
    }

    fn resolve_under_lock(
        &self,
        designation: &Designation,
        phase: Phase,
        cancellable: bool,
    ) -> Result<(), ResolveError> {
        let unit = &designation.unit;
        let unit_lock = unit.lock();
        let guard = if unit_lock.is_held_by_current_thread() || lock::may_block_on(unit.id()) {
            if cancellable {
                unit_lock.lock_cancellable(
                    &self.cancellation,
                    self.config.lock_poll_interval,
                    phase,
                )?
            } else {
                unit_lock.lock()
            }
        } else {
            // Waiting here could close a lock cycle with another thread.
            let held = lock::highest_held_unit().unwrap_or(unit.id());
            unit_lock.lock_ordered().ok_or_else(|| {
                warn!(unit = %unit.id(), %held, "unit lock busy and out of order");
                ResolveError::LockOrderViolation {
                    unit: unit.id(),
                    held,
                }
            })?
        };

        resolve_file_imports(self.provider.as_ref(), unit, &guard);

        if designation.is_file() {
            if phase > Phase::LAST_NON_LAZY && unit.root().phase() < phase {
                self.check_cancelled(cancellable, phase)?;
                self.resolve_file_annotations(unit, &guard, phase);
            }
            return Ok(());
        }

        // Another thread may have finished the work while we waited.
        let current = designation.current_phase();
        if current >= phase {
            self.stats.record_already_resolved();
            return Ok(());
        }

        for step in current.max(Phase::LAST_NON_LAZY).range_to(phase) {
            if step.is_extension() {
                continue;
            }
            self.check_cancelled(cancellable, step)?;
            self.run_phase(designation, step, &guard, cancellable)?;
        }
        Ok(())
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run_phase(
        &self,
        designation: &Designation,
        phase: Phase,
        guard: &UnitLockGuard<'_>,
        cancellable: bool,
    ) -> Result<(), ResolveError> {
        let Some(builder) = transformer_builder(phase) else {
            return Ok(());
        };
        let unit = designation.unit.as_ref();
        let ctx = self.context(unit, guard, cancellable);
        let mut transformer = builder(&ctx);
        let walk = DesignationWalker::new(designation).walk(&mut transformer, &ctx)?;
        transformer.finish(&ctx)?;
        walk.commit(unit, phase, guard);

        self.stats.record_invocation(phase);
        debug!(
            %phase,
            target = %designation.symbol(),
            members = walk.members.len(),
            "phase committed"
        );
        if self.config.check_invariants {
            ensure_resolved(designation, phase);
        }
        Ok(())
    }

    fn resolve_file_annotations(
        &self,
        unit: &CompilationUnit,
        guard: &UnitLockGuard<'_>,
        phase: Phase,
    ) {
        if unit.root().phase() >= phase {
            return;
        }
        let ctx = self.context(unit, guard, false);
        resolve_annotations(&ctx, DeclId::ROOT, phase);
        unit.raise_phase(DeclId::ROOT, phase, guard);
        debug!(unit = %unit.id(), %phase, "file annotations resolved");
    }

    fn context<'a>(
        &'a self,
        unit: &'a CompilationUnit,
        guard: &'a UnitLockGuard<'a>,
        cancellable: bool,
    ) -> TransformContext<'a> {
        let provider = self.provider.as_ref();
        TransformContext {
            provider,
            unit,
            guard,
            config: &self.config,
            scope: TypeScope::new(provider, unit, &self.config.default_imports),
            inference: self.inference.as_ref(),
            extensions: &self.extensions,
            stats: &self.stats,
            cancellation: cancellable.then_some(&self.cancellation),
        }
    }

    fn check_cancelled(&self, cancellable: bool, phase: Phase) -> Result<(), ResolveError> {
        if cancellable {
            self.cancellation.check(phase)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("extensions", &self.extensions.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// Every declaration of the chain must be at `phase` after it committed.
///
/// # Panics
///
/// Panics when a marker lags behind.
fn ensure_resolved(designation: &Designation, phase: Phase) {
    let unit = &designation.unit;
    assert!(
        unit.root().phase() >= Phase::LAST_NON_LAZY,
        "imports of {} not resolved before {phase}",
        unit.id()
    );
    for id in &designation.path {
        let reached = unit.get(*id).phase();
        assert!(
            reached >= phase,
            "path member {} is at {reached} after {phase}",
            unit.symbol(*id)
        );
    }
    let target = unit.get(designation.target);
    assert!(
        target.phase() >= phase && target.subtree_phase() >= phase,
        "target {} is at {}/{} after {phase}",
        designation.symbol(),
        target.phase(),
        target.subtree_phase()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasewise_core::{DeclSpec, TypeExpr, TypeSlot, UnitBuilder};
    use phasewise_registry::SymbolRegistry;

    fn create_test_resolver() -> (Arc<SymbolRegistry>, Resolver) {
        let registry = Arc::new(SymbolRegistry::with_builtins());
        let resolver = Resolver::new(registry.clone(), ResolverConfig::default());
        (registry, resolver)
    }

    #[test]
    fn raw_is_a_no_op() {
        let (registry, resolver) = create_test_resolver();
        let mut b = UnitBuilder::new("a.kt", "p");
        let f = b.add(DeclId::ROOT, DeclSpec::function("f"));
        let unit = registry.add_unit(b).unwrap();

        resolver.resolve(unit.symbol(f), Phase::Raw, false).unwrap();
        assert_eq!(unit.root().phase(), Phase::Raw);
        assert_eq!(resolver.stats().total_invocations(), 0);
    }

    #[test]
    fn phases_run_in_order_up_to_the_target() {
        let (registry, resolver) = create_test_resolver();
        // class A : B { fun f(): Int }   class B
        let mut b = UnitBuilder::new("a.kt", "p");
        let a = b.add(DeclId::ROOT, DeclSpec::class("A").with_supertype(TypeExpr::named("B")));
        let f = b.add(a, DeclSpec::function("f").with_type(TypeExpr::named("Int")));
        b.add(DeclId::ROOT, DeclSpec::class("B"));
        let unit = registry.add_unit(b).unwrap();

        resolver.resolve(unit.symbol(f), Phase::Types, false).unwrap();

        let stats = resolver.stats();
        assert_eq!(stats.invocations(Phase::SuperTypes), 1);
        assert_eq!(stats.invocations(Phase::SealedClassInheritors), 1);
        assert_eq!(stats.invocations(Phase::Types), 1);
        assert_eq!(stats.invocations(Phase::Status), 0);
        assert_eq!(unit.root().phase(), Phase::Imports);
        assert!(unit.get(a).phase() >= Phase::Types);
        assert!(matches!(
            unit.get(f).slots().return_type,
            TypeSlot::Resolved(_)
        ));
    }

    #[test]
    fn file_resolves_imports_then_annotations() {
        let (registry, resolver) = create_test_resolver();
        let mut b = UnitBuilder::new("a.kt", "p");
        b.file_annotation(TypeExpr::named("Suppress"));
        let unit = registry.add_unit(b).unwrap();
        let file = unit.symbol(DeclId::ROOT);

        resolver.resolve(file, Phase::Imports, false).unwrap();
        assert_eq!(unit.root().phase(), Phase::Imports);
        assert!(!unit.root().slots().annotations[0].is_resolved());

        resolver.resolve(file, Phase::Types, false).unwrap();
        assert_eq!(unit.root().phase(), Phase::Types);
        assert!(unit.root().slots().annotations[0].is_resolved());
        assert!(resolver.is_at_least(file, Phase::Types));
        assert!(!resolver.is_at_least(file, Phase::BodyResolve));
    }

    #[test]
    fn resolve_imports_and_annotations_of_unknown_unit_fails() {
        let (_, resolver) = create_test_resolver();
        let err = resolver
            .resolve_imports_and_annotations(UnitId::new(999))
            .unwrap_err();
        assert_eq!(err, ResolveError::UnitNotFound { unit: UnitId::new(999) });
    }

    #[test]
    fn library_declarations_are_always_resolved() {
        let (registry, resolver) = create_test_resolver();
        let int = registry
            .class_by_fq_name(&phasewise_core::FqName::top_level("builtins", "Int"))
            .unwrap();
        resolver.resolve(int, Phase::BodyResolve, false).unwrap();
        assert!(resolver.is_at_least(int, Phase::BodyResolve));
        assert_eq!(resolver.stats().total_invocations(), 0);
    }

    #[test]
    fn out_of_order_lock_wait_is_an_error() {
        let (registry, resolver) = create_test_resolver();
        let mut b = UnitBuilder::new("a.kt", "p");
        let f = b.add(DeclId::ROOT, DeclSpec::function("f"));
        let low = registry.add_unit(b).unwrap();
        let high = registry.add_unit(UnitBuilder::new("b.kt", "q")).unwrap();
        assert!(low.id() < high.id());

        let other = Arc::clone(&low);
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _guard = other.lock().lock();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        held_rx.recv().unwrap();

        let high_guard = high.lock().lock();
        let err = resolver
            .resolve(low.symbol(f), Phase::Types, false)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::LockOrderViolation {
                unit: low.id(),
                held: high.id()
            }
        );
        assert!(err.is_internal_fault());
        drop(high_guard);

        release_tx.send(()).unwrap();
        handle.join().unwrap();
        assert_eq!(low.get(f).phase(), Phase::Raw);
        resolver.resolve(low.symbol(f), Phase::Types, false).unwrap();
    }

    #[test]
    fn cancelled_resolve_commits_nothing_further() {
        let (registry, resolver) = create_test_resolver();
        let mut b = UnitBuilder::new("a.kt", "p");
        let f = b.add(DeclId::ROOT, DeclSpec::function("f"));
        let unit = registry.add_unit(b).unwrap();

        resolver.cancellation().cancel();
        let err = resolver
            .resolve(unit.symbol(f), Phase::BodyResolve, true)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(unit.get(f).phase(), Phase::Raw);
        assert_eq!(resolver.stats().snapshot().cancellations, 1);

        // Non-cancellable requests ignore the token.
        resolver.resolve(unit.symbol(f), Phase::Types, false).unwrap();
        assert!(unit.get(f).phase() >= Phase::Types);
    }
}
