//! Supertype phase and the cycle-safe supertype computation session.
//!
//! Resolving the supertype clause of a class may need the supertypes of
//! every class it names (inherited nested classifiers are visible in the
//! clause), transitively and possibly cyclically.
//!
//! ## Algorithm
//!
//! ```text
//! seed ──► compute ──► expand references ──► next round ... fixpoint
//!                                                  │
//!                          break cycles (tarjan) ◄─┘
//!                                  │
//!                                  ▼
//!              apply per unit, ordered by unit id
//! ```
//!
//! Every class is computed at most once per session. A lookup that reaches
//! a class still being computed sees no supertypes instead of recursing.
//! After the fixpoint, every supertype edge inside a strongly-connected
//! component is replaced by [`ResolvedType::Any`].

use std::collections::BTreeMap;
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use phasewise_core::{
    CompilationUnit, DeclId, DeclKind, Diagnostic, ImportTable, Phase, ResolveError,
    ResolvedType, Span, SymbolRef, TypeExpr, TypeSlot, UnitId, UnitLockGuard,
};
use phasewise_registry::SymbolProvider;

use crate::phases::imports::compute_import_table;
use crate::scope::{LookupPosition, SupertypeSource, TypeScope};
use crate::stats::ResolveStats;
use crate::transformer::{DeclTransformer, TransformContext};

// ============================================================================
// Session state
// ============================================================================

#[derive(Debug)]
enum Status {
    /// On the computation stack; doubles as the cycle marker.
    Computing,
    Computed(Computed),
}

#[derive(Debug, Default)]
struct Computed {
    types: Vec<ResolvedType>,
    /// Written reference for each entry of `types`, if it came from source.
    written: Vec<Option<TypeExpr>>,
    errors: Vec<ResolveError>,
    /// Read from slots that were already resolved; never written back.
    committed: bool,
    is_alias: bool,
    /// Written back (or deferred) already.
    applied: bool,
}

impl Computed {
    fn from_slots(types: Vec<ResolvedType>) -> Self {
        Self {
            types,
            committed: true,
            ..Self::default()
        }
    }

    fn class_symbols(&self) -> impl Iterator<Item = SymbolRef> + '_ {
        self.types.iter().filter_map(ResolvedType::class_symbol)
    }

    fn is_pending(&self) -> bool {
        !self.committed && !self.applied
    }
}

/// Memoized supertype computation shared by everything one phase run
/// resolves.
pub struct SupertypeSession<'a> {
    provider: &'a dyn SymbolProvider,
    default_imports: &'a [String],
    status: FxHashMap<SymbolRef, Status>,
    /// Symbols in the order their computation started.
    order: Vec<SymbolRef>,
    /// `order[..expanded]` had their references queued already.
    expanded: usize,
    /// Seeds are resolved through the walk; transitively reached classes
    /// get their members marked here.
    seeds: FxHashSet<SymbolRef>,
    units: FxHashMap<UnitId, (Arc<CompilationUnit>, ImportTable)>,
    processed: usize,
}

impl<'a> SupertypeSession<'a> {
    pub fn new(provider: &'a dyn SymbolProvider, default_imports: &'a [String]) -> Self {
        Self {
            provider,
            default_imports,
            status: FxHashMap::default(),
            order: Vec::new(),
            expanded: 0,
            seeds: FxHashSet::default(),
            units: FxHashMap::default(),
            processed: 0,
        }
    }

    /// Resolved supertypes of `class` as computed by this session.
    pub fn supertypes_of(&self, class: SymbolRef) -> Option<&[ResolvedType]> {
        match self.status.get(&class)? {
            Status::Computed(computed) => Some(&computed.types),
            Status::Computing => None,
        }
    }

    /// Number of classes computed so far.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Compute `seeds` and everything they reference, break cycles and
    /// write the results back.
    pub fn resolve(
        &mut self,
        ctx: &TransformContext<'_>,
        seeds: &[SymbolRef],
    ) -> Result<(), ResolveError> {
        self.seeds.extend(seeds.iter().copied());
        self.compute_rounds(ctx, seeds.to_vec())?;
        self.break_cycles();
        self.apply(ctx);
        Ok(())
    }

    fn compute_rounds(
        &mut self,
        ctx: &TransformContext<'_>,
        mut work: Vec<SymbolRef>,
    ) -> Result<(), ResolveError> {
        let interval = ctx.config.cancellation_check_interval.max(1);
        while !work.is_empty() {
            ctx.stats.record_supertype_round();
            for symbol in work.drain(..) {
                if self.status.contains_key(&symbol) {
                    continue;
                }
                self.compute(symbol);
                self.processed += 1;
                if self.processed % interval == 0 {
                    ctx.check_cancelled(Phase::SuperTypes)?;
                }
            }
            work = self.expand_references();
        }
        trace!(classes = self.order.len(), "supertype fixpoint reached");
        Ok(())
    }

    /// References of newly computed classes that have not been seen yet.
    fn expand_references(&mut self) -> Vec<SymbolRef> {
        let mut next = Vec::new();
        while self.expanded < self.order.len() {
            let symbol = self.order[self.expanded];
            self.expanded += 1;
            let Some(Status::Computed(computed)) = self.status.get(&symbol) else {
                continue;
            };
            if computed.committed {
                continue;
            }
            for reference in computed.class_symbols() {
                if !self.status.contains_key(&reference) && !next.contains(&reference) {
                    next.push(reference);
                }
            }
        }
        next
    }

    fn compute(&mut self, symbol: SymbolRef) {
        self.status.insert(symbol, Status::Computing);
        self.order.push(symbol);
        let computed = self.evaluate(symbol);
        self.status.insert(symbol, Status::Computed(computed));
    }

    fn evaluate(&mut self, symbol: SymbolRef) -> Computed {
        let Some(unit) = self.unit(symbol.unit) else {
            return Computed::from_slots(Vec::new());
        };
        let Some(decl) = unit.declaration(symbol.decl) else {
            return Computed::from_slots(Vec::new());
        };
        if !decl.kind.is_class_like() {
            return Computed::from_slots(Vec::new());
        }
        let is_alias = decl.kind == DeclKind::TypeAlias;
        let written: Vec<TypeSlot> = {
            let slots = decl.slots();
            if is_alias {
                slots.expanded_type.iter().cloned().collect()
            } else {
                slots.supertypes.clone()
            }
        };
        if decl.phase() >= Phase::SuperTypes || !decl.origin.is_available_for_resolve() {
            let types = written
                .iter()
                .filter_map(TypeSlot::resolved)
                .cloned()
                .collect();
            return Computed::from_slots(types);
        }

        let imports = self.imports_of(&unit);
        let scope = TypeScope::with_imports(self.provider, &unit, imports, self.default_imports);
        let mut computed = Computed {
            is_alias,
            ..Computed::default()
        };
        for slot in written {
            match slot {
                TypeSlot::Unresolved(expr) => {
                    let ty = scope.resolve(
                        symbol.decl,
                        &expr,
                        LookupPosition::Header,
                        self,
                        &mut computed.errors,
                    );
                    computed.types.push(ty);
                    computed.written.push(Some(expr));
                }
                TypeSlot::Resolved(ty) => {
                    computed.types.push(ty);
                    computed.written.push(None);
                }
                TypeSlot::Implicit => {}
            }
        }
        if !is_alias && computed.types.is_empty() {
            computed.types.push(ResolvedType::Any);
            computed.written.push(None);
        }
        trace!(class = %symbol, supertypes = computed.types.len(), "computed supertypes");
        computed
    }

    fn unit(&mut self, id: UnitId) -> Option<Arc<CompilationUnit>> {
        if let Some((unit, _)) = self.units.get(&id) {
            return Some(Arc::clone(unit));
        }
        let unit = self.provider.unit(id)?;
        let imports = unit
            .root()
            .slots()
            .imports
            .clone()
            .unwrap_or_else(|| compute_import_table(self.provider, &unit).0);
        self.units.insert(id, (Arc::clone(&unit), imports));
        Some(unit)
    }

    fn imports_of(&self, unit: &CompilationUnit) -> ImportTable {
        self.units
            .get(&unit.id())
            .map(|(_, imports)| imports.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Cycle breaking
    // ========================================================================

    fn break_cycles(&mut self) {
        let mut graph: DiGraph<SymbolRef, ()> = DiGraph::new();
        let mut nodes: FxHashMap<SymbolRef, NodeIndex> = FxHashMap::default();
        for symbol in &self.order {
            nodes.insert(*symbol, graph.add_node(*symbol));
        }
        for symbol in &self.order {
            let Some(Status::Computed(computed)) = self.status.get(symbol) else {
                continue;
            };
            for reference in computed.class_symbols() {
                if let Some(target) = nodes.get(&reference) {
                    graph.add_edge(nodes[symbol], *target, ());
                }
            }
        }

        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1
                || graph.contains_edge(component[0], component[0]);
            if !is_cycle {
                continue;
            }
            let members: FxHashSet<SymbolRef> =
                component.iter().map(|node| graph[*node]).collect();
            for symbol in &members {
                let Some(Status::Computed(computed)) = self.status.get_mut(symbol) else {
                    continue;
                };
                if !computed.is_pending() {
                    continue;
                }
                for (ty, written) in computed.types.iter_mut().zip(&computed.written) {
                    if !ty.class_symbol().is_some_and(|s| members.contains(&s)) {
                        continue;
                    }
                    let (name, span) = match written {
                        Some(expr) => (expr.name.clone(), expr.span),
                        None => (ty.to_string(), Span::default()),
                    };
                    debug!(class = %symbol, supertype = %name, "breaking supertype cycle");
                    *ty = ResolvedType::Any;
                    computed
                        .errors
                        .push(ResolveError::CyclicSupertype { name, span });
                }
            }
        }
    }

    // ========================================================================
    // Application
    // ========================================================================

    fn apply(&mut self, ctx: &TransformContext<'_>) {
        let mut by_unit: BTreeMap<UnitId, Vec<SymbolRef>> = BTreeMap::new();
        for symbol in &self.order {
            if let Some(Status::Computed(computed)) = self.status.get(symbol) {
                if computed.is_pending() {
                    by_unit.entry(symbol.unit).or_default().push(*symbol);
                }
            }
        }

        for (unit_id, symbols) in by_unit {
            if unit_id == ctx.unit.id() {
                self.apply_to(ctx.unit, ctx.guard, &symbols);
            } else if let Some(unit) = self.unit(unit_id) {
                match unit.lock().lock_ordered() {
                    Some(guard) => self.apply_to(&unit, &guard, &symbols),
                    None => defer(ctx.stats, unit_id, symbols.len()),
                }
            }
            for symbol in &symbols {
                if let Some(Status::Computed(computed)) = self.status.get_mut(symbol) {
                    computed.applied = true;
                }
            }
        }
    }

    fn apply_to(&self, unit: &CompilationUnit, guard: &UnitLockGuard<'_>, symbols: &[SymbolRef]) {
        for symbol in symbols {
            let Some(Status::Computed(computed)) = self.status.get(symbol) else {
                continue;
            };
            let decl = unit.get(symbol.decl);
            if decl.phase() >= Phase::SuperTypes {
                continue;
            }
            {
                let mut slots = unit.slots_mut(symbol.decl, guard);
                let resolved = computed.types.iter().cloned().map(TypeSlot::Resolved);
                if computed.is_alias {
                    slots.expanded_type = resolved.into_iter().next();
                } else {
                    slots.supertypes = resolved.collect();
                }
                for error in &computed.errors {
                    slots.push_diagnostic(Diagnostic::new(Phase::SuperTypes, error.clone()));
                }
            }
            unit.raise_phase(symbol.decl, Phase::SuperTypes, guard);
            if !self.seeds.contains(symbol) {
                mark_members(unit, symbol.decl, guard);
            }
        }
    }
}

/// Members other than nested classifiers need nothing from this phase.
fn mark_members(unit: &CompilationUnit, class: DeclId, guard: &UnitLockGuard<'_>) {
    for child in &unit.get(class).children {
        let member = unit.get(*child);
        if member.kind.is_class_like() || member.is_local {
            continue;
        }
        for id in unit.subtree(*child) {
            let decl = unit.get(id);
            if decl.is_local || !decl.origin.is_available_for_resolve() {
                continue;
            }
            unit.raise_phase(id, Phase::SuperTypes, guard);
            unit.raise_subtree_phase(id, Phase::SuperTypes, guard);
        }
    }
}

fn defer(stats: &ResolveStats, unit: UnitId, count: usize) {
    warn!(
        %unit,
        classes = count,
        "unit lock unavailable in lock order, deferring supertype application"
    );
    stats.record_deferral();
}

impl SupertypeSource for SupertypeSession<'_> {
    fn supertype_classes(&mut self, class: SymbolRef) -> Vec<SymbolRef> {
        if !self.status.contains_key(&class) {
            self.compute(class);
        }
        match self.status.get(&class) {
            Some(Status::Computed(computed)) => computed.class_symbols().collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Phase transformer
// ============================================================================

/// Resolves the supertypes of every class-like declaration the walk
/// reaches.
pub struct SupertypeTransformer<'a> {
    session: SupertypeSession<'a>,
}

impl<'a> SupertypeTransformer<'a> {
    pub fn new(provider: &'a dyn SymbolProvider, default_imports: &'a [String]) -> Self {
        Self {
            session: SupertypeSession::new(provider, default_imports),
        }
    }

    fn resolve_class(&mut self, ctx: &TransformContext<'_>, decl: DeclId) -> Result<(), ResolveError> {
        if !ctx.unit.get(decl).kind.is_class_like() {
            return Ok(());
        }
        self.session.resolve(ctx, &[ctx.unit.symbol(decl)])
    }
}

impl DeclTransformer for SupertypeTransformer<'_> {
    fn phase(&self) -> Phase {
        Phase::SuperTypes
    }

    fn transform_path_member(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        self.resolve_class(ctx, decl)
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        self.resolve_class(ctx, decl)
    }
}
