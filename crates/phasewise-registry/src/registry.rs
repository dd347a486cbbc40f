//! SymbolRegistry - storage for compilation units and the classifier index.
//!
//! # Storage Model
//!
//! - **Units**: `Arc<CompilationUnit>` by [`UnitId`]. Ids are allocated
//!   monotonically and never reused, so a replaced unit can not alias its
//!   successor.
//! - **Classifiers**: every non-local class and type alias, indexed by the
//!   [`SymbolId`] of its fully-qualified name.
//! - **Pending sources**: units that have not been built yet. A source
//!   lists the classifiers it declares; the first lookup of any of them
//!   builds the unit.
//!
//! # Thread Safety
//!
//! All state sits behind one `parking_lot::RwLock`. Lookups take the read
//! lock only; building a pending source upgrades to the write lock. The
//! registry lock is never held while a unit lock is acquired.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use phasewise_core::{CompilationUnit, FqName, SymbolId, SymbolRef, UnitBuilder, UnitId};

use crate::builtins::builtins_unit;
use crate::{RegistryError, SymbolProvider};

type SourceFn = Box<dyn FnOnce() -> UnitBuilder + Send + Sync>;

struct PendingSource {
    path: String,
    build: SourceFn,
}

#[derive(Default)]
struct RegistryState {
    units: FxHashMap<UnitId, Arc<CompilationUnit>>,
    paths: FxHashMap<String, UnitId>,
    classifiers: FxHashMap<SymbolId, SymbolRef>,
    packages: FxHashSet<SymbolId>,
    pending: FxHashMap<u32, PendingSource>,
    /// Classifier -> pending source key.
    pending_index: FxHashMap<SymbolId, u32>,
    next_source: u32,
}

/// Thread-safe registry of compilation units.
pub struct SymbolRegistry {
    state: RwLock<RegistryState>,
    next_unit: AtomicU32,
}

impl SymbolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_unit: AtomicU32::new(0),
        }
    }

    /// Create a registry holding the `builtins` unit.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        if let Err(err) = registry.add_unit(builtins_unit()) {
            // An empty registry can not contain duplicates.
            unreachable!("builtins failed to register: {err}");
        }
        registry
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Build and register a unit.
    pub fn add_unit(&self, builder: UnitBuilder) -> Result<Arc<CompilationUnit>, RegistryError> {
        let mut state = self.state.write();
        self.insert_locked(&mut state, builder, None)
    }

    /// Register a unit that is built on first lookup of any classifier in
    /// `declares`.
    pub fn add_source(
        &self,
        path: impl Into<String>,
        declares: Vec<FqName>,
        build: impl FnOnce() -> UnitBuilder + Send + Sync + 'static,
    ) {
        let path = path.into();
        let mut state = self.state.write();
        let key = state.next_source;
        state.next_source += 1;
        for name in &declares {
            register_package(&mut state.packages, &name.package);
            state.pending_index.insert(name.symbol_id(), key);
        }
        trace!(path = %path, classifiers = declares.len(), "registered lazy source");
        state.pending.insert(
            key,
            PendingSource {
                path,
                build: Box::new(build),
            },
        );
    }

    /// Discard `old` and register the unit rebuilt from changed source.
    ///
    /// The new unit gets a fresh id. Holders of the old `Arc` keep a valid
    /// but unreachable snapshot.
    pub fn replace_unit(
        &self,
        old: UnitId,
        builder: UnitBuilder,
    ) -> Result<Arc<CompilationUnit>, RegistryError> {
        let mut state = self.state.write();
        let previous = state.units.remove(&old).ok_or(RegistryError::UnknownUnit(old))?;
        state.paths.remove(previous.path());
        state.classifiers.retain(|_, symbol| symbol.unit != old);

        match self.insert_locked(&mut state, builder, Some(old)) {
            Ok(unit) => Ok(unit),
            Err(err) => {
                // Put the old unit back so a failed rebuild changes nothing.
                restore(&mut state, previous);
                Err(err)
            }
        }
    }

    fn insert_locked(
        &self,
        state: &mut RegistryState,
        builder: UnitBuilder,
        replaces: Option<UnitId>,
    ) -> Result<Arc<CompilationUnit>, RegistryError> {
        let id = UnitId::new(self.next_unit.fetch_add(1, Ordering::Relaxed));
        let unit = builder.build(id);

        if state.paths.contains_key(unit.path()) {
            return Err(RegistryError::DuplicatePath(unit.path().to_string()));
        }
        let classifiers: Vec<(SymbolId, SymbolRef, &FqName)> = unit
            .declarations()
            .filter_map(|decl| {
                decl.fq_name
                    .as_ref()
                    .map(|name| (name.symbol_id(), unit.symbol(decl.id), name))
            })
            .collect();
        for (id, _, name) in &classifiers {
            if let Some(existing) = state.classifiers.get(id) {
                return Err(RegistryError::DuplicateClassifier {
                    name: name.to_string(),
                    existing: *existing,
                });
            }
        }

        for (id, symbol, _) in &classifiers {
            state.classifiers.insert(*id, *symbol);
            state.pending_index.remove(id);
        }
        register_package(&mut state.packages, unit.package());
        let count = classifiers.len();
        drop(classifiers);

        let unit = Arc::new(unit);
        state.paths.insert(unit.path().to_string(), id);
        state.units.insert(id, Arc::clone(&unit));
        debug!(
            unit = %id,
            path = unit.path(),
            classifiers = count,
            replaces = ?replaces,
            "registered compilation unit"
        );
        Ok(unit)
    }

    /// Build the pending source declaring `id`, if any.
    fn materialize(&self, id: SymbolId) -> Option<SymbolRef> {
        let mut state = self.state.write();
        if let Some(found) = state.classifiers.get(&id) {
            return Some(*found);
        }
        let key = state.pending_index.get(&id).copied()?;
        state.pending_index.retain(|_, source| *source != key);
        let source = state.pending.remove(&key)?;

        let path = source.path;
        let builder = (source.build)();
        if let Err(err) = self.insert_locked(&mut state, builder, None) {
            warn!(path = %path, error = %err, "lazy source failed to register");
            return None;
        }
        state.classifiers.get(&id).copied()
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn unit(&self, id: UnitId) -> Option<Arc<CompilationUnit>> {
        self.state.read().units.get(&id).cloned()
    }

    pub fn unit_by_path(&self, path: &str) -> Option<Arc<CompilationUnit>> {
        let state = self.state.read();
        state
            .paths
            .get(path)
            .and_then(|id| state.units.get(id))
            .cloned()
    }

    pub fn class_by_fq_name(&self, name: &FqName) -> Option<SymbolRef> {
        SymbolProvider::class_by_fq_name(self, name)
    }

    /// Registered unit ids, ascending.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.state.read().units.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn unit_count(&self) -> usize {
        self.state.read().units.len()
    }

    pub fn pending_source_count(&self) -> usize {
        self.state.read().pending.len()
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SymbolRegistry")
            .field("units", &state.units.len())
            .field("classifiers", &state.classifiers.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl SymbolProvider for SymbolRegistry {
    fn unit(&self, id: UnitId) -> Option<Arc<CompilationUnit>> {
        SymbolRegistry::unit(self, id)
    }

    fn classifier(&self, id: SymbolId) -> Option<SymbolRef> {
        {
            let state = self.state.read();
            if let Some(found) = state.classifiers.get(&id) {
                return Some(*found);
            }
            if !state.pending_index.contains_key(&id) {
                return None;
            }
        }
        self.materialize(id)
    }

    fn has_package(&self, package: &str) -> bool {
        self.state
            .read()
            .packages
            .contains(&SymbolId::package(package))
    }
}

/// Register `package` and every enclosing package.
fn register_package(packages: &mut FxHashSet<SymbolId>, package: &str) {
    packages.insert(SymbolId::package(package));
    let mut end = package.len();
    while let Some(dot) = package[..end].rfind('.') {
        packages.insert(SymbolId::package(&package[..dot]));
        end = dot;
    }
}

fn restore(state: &mut RegistryState, unit: Arc<CompilationUnit>) {
    for decl in unit.declarations() {
        if let Some(name) = &decl.fq_name {
            state.classifiers.insert(name.symbol_id(), unit.symbol(decl.id));
        }
    }
    state.paths.insert(unit.path().to_string(), unit.id());
    state.units.insert(unit.id(), unit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasewise_core::{DeclId, DeclSpec, Phase, ResolveError};
    use std::sync::atomic::AtomicUsize;

    fn unit_with_classes(path: &str, package: &str, names: &[&str]) -> UnitBuilder {
        let mut builder = UnitBuilder::new(path, package);
        for name in names {
            builder.add(DeclId::ROOT, DeclSpec::class(name));
        }
        builder
    }

    #[test]
    fn classifiers_are_indexed() {
        let registry = SymbolRegistry::new();
        let unit = registry
            .add_unit(unit_with_classes("a.kt", "app", &["A", "B"]))
            .unwrap();

        let a = registry
            .class_by_fq_name(&FqName::top_level("app", "A"))
            .unwrap();
        assert_eq!(a.unit, unit.id());
        assert_eq!(unit.get(a.decl).name.as_deref(), Some("A"));
        assert_eq!(registry.class_in_package("app", "B").map(|s| s.unit), Some(unit.id()));
        assert!(registry.class_in_package("app", "C").is_none());
    }

    #[test]
    fn nested_classifiers_are_indexed() {
        let registry = SymbolRegistry::new();
        let mut builder = UnitBuilder::new("a.kt", "app");
        let outer = builder.add(DeclId::ROOT, DeclSpec::class("Outer"));
        let inner = builder.add(outer, DeclSpec::class("Inner"));
        let unit = registry.add_unit(builder).unwrap();

        assert_eq!(
            registry.class_in_package("app", "Outer.Inner"),
            Some(unit.symbol(inner))
        );
    }

    #[test]
    fn duplicate_classifier_is_rejected() {
        let registry = SymbolRegistry::new();
        registry
            .add_unit(unit_with_classes("a.kt", "app", &["A"]))
            .unwrap();
        let err = registry
            .add_unit(unit_with_classes("b.kt", "app", &["A"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClassifier { .. }));
        assert_eq!(registry.unit_count(), 1);
    }

    #[test]
    fn packages_include_parents() {
        let registry = SymbolRegistry::new();
        registry
            .add_unit(unit_with_classes("a.kt", "org.app.model", &["A"]))
            .unwrap();
        assert!(registry.has_package("org"));
        assert!(registry.has_package("org.app"));
        assert!(registry.has_package("org.app.model"));
        assert!(!registry.has_package("org.other"));
    }

    #[test]
    fn lazy_source_is_built_once_on_first_lookup() {
        let registry = SymbolRegistry::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        registry.add_source(
            "lazy.kt",
            vec![FqName::top_level("lib", "Lazy"), FqName::top_level("lib", "Other")],
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                unit_with_classes("lazy.kt", "lib", &["Lazy", "Other"])
            },
        );
        assert_eq!(registry.unit_count(), 0);
        assert!(registry.has_package("lib"));

        let lazy = registry.class_in_package("lib", "Lazy").unwrap();
        let other = registry.class_in_package("lib", "Other").unwrap();
        assert_eq!(lazy.unit, other.unit);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending_source_count(), 0);
    }

    #[test]
    fn replaced_unit_gets_fresh_id() {
        let registry = SymbolRegistry::new();
        let old = registry
            .add_unit(unit_with_classes("a.kt", "app", &["A", "Gone"]))
            .unwrap();
        let new = registry
            .replace_unit(old.id(), unit_with_classes("a.kt", "app", &["A"]))
            .unwrap();

        assert_ne!(old.id(), new.id());
        assert!(registry.unit(old.id()).is_none());
        assert_eq!(registry.class_in_package("app", "A").map(|s| s.unit), Some(new.id()));
        assert!(registry.class_in_package("app", "Gone").is_none());
        // The old snapshot is still readable.
        assert_eq!(old.get(DeclId::new(1)).phase(), Phase::Raw);
    }

    #[test]
    fn replacing_unknown_unit_fails() {
        let registry = SymbolRegistry::new();
        let err = registry
            .replace_unit(UnitId::new(42), unit_with_classes("a.kt", "app", &[]))
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownUnit(UnitId::new(42)));
    }

    #[test]
    fn declaration_lookup_reports_missing_units() {
        let registry = SymbolRegistry::new();
        let unit = registry
            .add_unit(unit_with_classes("a.kt", "app", &["A"]))
            .unwrap();
        let handle = registry.declaration(unit.symbol(DeclId::new(1))).unwrap();
        assert_eq!(handle.name.as_deref(), Some("A"));

        let missing = SymbolRef::new(UnitId::new(99), DeclId::ROOT);
        assert_eq!(
            registry.declaration(missing).unwrap_err(),
            ResolveError::ContainingUnitNotFound { symbol: missing }
        );
        let out_of_range = unit.symbol(DeclId::new(50));
        assert_eq!(
            registry.declaration(out_of_range).unwrap_err(),
            ResolveError::SymbolNotFound {
                symbol: out_of_range
            }
        );
    }

    #[test]
    fn builtins_are_library_classes() {
        let registry = SymbolRegistry::with_builtins();
        let any = registry.class_in_package("builtins", "Any").unwrap();
        let handle = registry.declaration(any).unwrap();
        assert_eq!(handle.phase(), Phase::BodyResolve);
    }
}
