//! Name resolution for written type references.
//!
//! ## Lookup order
//!
//! For a simple name looked up from declaration `at`:
//!
//! 1. type parameters of `at` and its enclosing declarations
//! 2. classifiers declared in enclosing declarations, innermost first,
//!    including classifiers inherited through supertypes of enclosing
//!    classes
//! 3. explicit and aliased imports of the file
//! 4. the file's own package
//! 5. star imports, in order
//! 6. default imports (`builtins`)
//!
//! A dotted name is first tried as a fully-qualified classifier; otherwise
//! its first segment is looked up as above and the rest are resolved as
//! nested classifiers.
//!
//! Inherited lookups need supertypes, which are exactly what the supertype
//! phase is still computing. The caller decides where they come from through
//! a [`SupertypeSource`].

use rustc_hash::FxHashSet;
use tracing::warn;

use phasewise_core::{
    CompilationUnit, DeclId, DeclKind, ImportTable, ResolveError, ResolvedType, SymbolId,
    SymbolRef, TypeExpr, TypeSlot,
};
use phasewise_registry::SymbolProvider;

use crate::phases::imports::compute_import_table;

/// Supplies the direct supertype classifiers of a class-like declaration.
pub trait SupertypeSource {
    fn supertype_classes(&mut self, class: SymbolRef) -> Vec<SymbolRef>;
}

/// Reads supertypes already committed to declaration slots.
pub struct CommittedSupertypes<'a> {
    provider: &'a dyn SymbolProvider,
}

impl<'a> CommittedSupertypes<'a> {
    pub fn new(provider: &'a dyn SymbolProvider) -> Self {
        Self { provider }
    }
}

impl SupertypeSource for CommittedSupertypes<'_> {
    fn supertype_classes(&mut self, class: SymbolRef) -> Vec<SymbolRef> {
        let Ok(decl) = self.provider.declaration(class) else {
            return Vec::new();
        };
        let slots = decl.slots();
        if decl.kind == DeclKind::TypeAlias {
            return slots
                .expanded_type
                .as_ref()
                .and_then(TypeSlot::resolved)
                .and_then(ResolvedType::class_symbol)
                .into_iter()
                .collect();
        }
        slots
            .supertypes
            .iter()
            .filter_map(TypeSlot::resolved)
            .filter_map(ResolvedType::class_symbol)
            .collect()
    }
}

/// What a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    Class(SymbolRef),
    TypeParameter(SymbolRef),
}

/// Whether the lookup starts inside or on the header of `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPosition {
    /// Inside the declaration: its own nested classifiers are visible.
    Body,
    /// In a class header (supertype list): only type parameters of `at`
    /// are visible, not its members.
    Header,
}

/// Name scope of one compilation unit.
pub struct TypeScope<'a> {
    provider: &'a dyn SymbolProvider,
    unit: &'a CompilationUnit,
    imports: ImportTable,
    default_imports: &'a [String],
}

impl<'a> TypeScope<'a> {
    /// Scope of `unit`. Uses the committed import table when the unit's
    /// imports are resolved, otherwise computes one without storing it.
    pub fn new(
        provider: &'a dyn SymbolProvider,
        unit: &'a CompilationUnit,
        default_imports: &'a [String],
    ) -> Self {
        let committed = unit.root().slots().imports.clone();
        let imports = committed.unwrap_or_else(|| compute_import_table(provider, unit).0);
        Self::with_imports(provider, unit, imports, default_imports)
    }

    /// Scope of `unit` with an already computed import table.
    pub fn with_imports(
        provider: &'a dyn SymbolProvider,
        unit: &'a CompilationUnit,
        imports: ImportTable,
        default_imports: &'a [String],
    ) -> Self {
        Self {
            provider,
            unit,
            imports,
            default_imports,
        }
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    pub fn unit(&self) -> &CompilationUnit {
        self.unit
    }

    /// Resolve a written type. Unresolved names become error types and are
    /// reported in `errors`.
    pub fn resolve(
        &self,
        at: DeclId,
        expr: &TypeExpr,
        position: LookupPosition,
        sources: &mut dyn SupertypeSource,
        errors: &mut Vec<ResolveError>,
    ) -> ResolvedType {
        let args: Vec<ResolvedType> = expr
            .args
            .iter()
            .map(|arg| self.resolve(at, arg, LookupPosition::Body, sources, errors))
            .collect();
        match self.lookup(at, &expr.name, position, sources) {
            Some(Classifier::Class(symbol)) => ResolvedType::Class {
                symbol,
                args,
                nullable: expr.is_nullable,
            },
            Some(Classifier::TypeParameter(symbol)) => ResolvedType::TypeParameter {
                symbol,
                nullable: expr.is_nullable,
            },
            None => {
                warn!(
                    unit = %self.unit.id(),
                    name = %expr.name,
                    span = %expr.span,
                    "unresolved type reference"
                );
                errors.push(ResolveError::UnresolvedSymbol {
                    name: expr.name.clone(),
                    span: expr.span,
                });
                ResolvedType::error(expr.name.clone())
            }
        }
    }

    /// Look up a simple or dotted classifier name.
    pub fn lookup(
        &self,
        at: DeclId,
        name: &str,
        position: LookupPosition,
        sources: &mut dyn SupertypeSource,
    ) -> Option<Classifier> {
        let Some((first, rest)) = name.split_once('.') else {
            return self.lookup_simple(at, name, position, sources);
        };
        if let Some(symbol) = self.provider.classifier(SymbolId::classifier(name)) {
            return Some(Classifier::Class(symbol));
        }
        let Some(Classifier::Class(mut current)) = self.lookup_simple(at, first, position, sources)
        else {
            return None;
        };
        for segment in rest.split('.') {
            let unit = self.provider.unit(current.unit)?;
            let nested = unit.nested_classifier(current.decl, segment)?;
            current = unit.symbol(nested);
        }
        Some(Classifier::Class(current))
    }

    fn lookup_simple(
        &self,
        at: DeclId,
        name: &str,
        position: LookupPosition,
        sources: &mut dyn SupertypeSource,
    ) -> Option<Classifier> {
        let unit = self.unit;
        let scopes: Vec<DeclId> = std::iter::once(at).chain(unit.ancestors(at)).collect();

        for owner in &scopes {
            if let Some(param) = self.type_parameter(*owner, name) {
                return Some(Classifier::TypeParameter(unit.symbol(param)));
            }
        }

        let local_context = unit.get(at).is_local;
        let skip = usize::from(position == LookupPosition::Header);
        for owner in scopes.iter().skip(skip) {
            let owner_decl = unit.get(*owner);
            let is_class = owner_decl.kind.is_class_like();
            // Callables only declare local classifiers.
            if !is_class && !owner.is_root() && !local_context {
                continue;
            }
            if let Some(found) = unit.nested_classifier(*owner, name) {
                return Some(Classifier::Class(unit.symbol(found)));
            }
            if is_class {
                if let Some(found) = self.inherited_classifier(unit.symbol(*owner), name, sources) {
                    return Some(Classifier::Class(found));
                }
            }
        }

        if let Some(symbol) = self.imports.lookup(name) {
            return Some(Classifier::Class(symbol));
        }
        if let Some(symbol) = self.provider.class_in_package(unit.package(), name) {
            return Some(Classifier::Class(symbol));
        }
        self.imports
            .star_packages
            .iter()
            .chain(self.default_imports.iter())
            .find_map(|package| self.provider.class_in_package(package, name))
            .map(Classifier::Class)
    }

    fn type_parameter(&self, owner: DeclId, name: &str) -> Option<DeclId> {
        self.unit
            .get(owner)
            .children
            .iter()
            .copied()
            .find(|child| {
                let decl = self.unit.get(*child);
                decl.kind == DeclKind::TypeParameter && decl.name.as_deref() == Some(name)
            })
    }

    /// Nested classifier `name` declared in a (transitive) supertype of
    /// `class`.
    fn inherited_classifier(
        &self,
        class: SymbolRef,
        name: &str,
        sources: &mut dyn SupertypeSource,
    ) -> Option<SymbolRef> {
        let mut visited = FxHashSet::default();
        visited.insert(class);
        let mut queue = sources.supertype_classes(class);
        while let Some(next) = queue.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Some(unit) = self.provider.unit(next.unit) {
                if let Some(found) = unit.nested_classifier(next.decl, name) {
                    return Some(unit.symbol(found));
                }
            }
            queue.extend(sources.supertype_classes(next));
        }
        None
    }

    /// Type of a builtin class, searched through the default imports.
    pub fn builtin_type(&self, name: &str) -> ResolvedType {
        self.default_imports
            .iter()
            .find_map(|package| self.provider.class_in_package(package, name))
            .map(ResolvedType::class)
            .unwrap_or_else(|| ResolvedType::error(name))
    }
}
