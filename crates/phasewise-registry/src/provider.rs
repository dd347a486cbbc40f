//! The symbol provider seam used by the resolver.

use std::ops::Deref;
use std::sync::Arc;

use phasewise_core::{
    CompilationUnit, DeclId, Declaration, FqName, ResolveError, SymbolId, SymbolRef, UnitId,
    join_package,
};

/// Source of compilation units and classifier lookups.
///
/// Implementations may build units lazily on first lookup. Returned units
/// are shared snapshots: a replaced unit stays valid for holders of the old
/// `Arc`, but is no longer reachable through the provider.
pub trait SymbolProvider: Send + Sync {
    /// The registered unit with this id.
    fn unit(&self, id: UnitId) -> Option<Arc<CompilationUnit>>;

    /// The non-local classifier whose fully-qualified name hashes to `id`.
    fn classifier(&self, id: SymbolId) -> Option<SymbolRef>;

    /// Whether any unit declares `package` (or a sub-package of it).
    fn has_package(&self, package: &str) -> bool;

    /// Classifier by structured name.
    fn class_by_fq_name(&self, name: &FqName) -> Option<SymbolRef> {
        self.classifier(name.symbol_id())
    }

    /// Classifier `path` (`Outer.Inner` or `Name`) relative to `package`.
    fn class_in_package(&self, package: &str, path: &str) -> Option<SymbolRef> {
        self.classifier(SymbolId::classifier(&join_package(package, path)))
    }

    /// The declaration behind `symbol`, with its owning unit.
    fn declaration(&self, symbol: SymbolRef) -> Result<DeclHandle, ResolveError> {
        let unit = self
            .unit(symbol.unit)
            .ok_or(ResolveError::ContainingUnitNotFound { symbol })?;
        DeclHandle::new(unit, symbol.decl)
    }
}

/// A declaration together with the unit that owns it.
///
/// Dereferences to the [`Declaration`].
#[derive(Debug, Clone)]
pub struct DeclHandle {
    unit: Arc<CompilationUnit>,
    id: DeclId,
}

impl DeclHandle {
    pub fn new(unit: Arc<CompilationUnit>, id: DeclId) -> Result<Self, ResolveError> {
        if unit.declaration(id).is_none() {
            return Err(ResolveError::SymbolNotFound {
                symbol: unit.symbol(id),
            });
        }
        Ok(Self { unit, id })
    }

    pub fn unit(&self) -> &Arc<CompilationUnit> {
        &self.unit
    }

    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn symbol(&self) -> SymbolRef {
        self.unit.symbol(self.id)
    }
}

impl Deref for DeclHandle {
    type Target = Declaration;

    fn deref(&self) -> &Declaration {
        self.unit.get(self.id)
    }
}
