//! Declarations: the nodes of the declaration graph.
//!
//! A [`Declaration`] splits into two parts:
//!
//! - **Structure** (kind, name, parent, children, origin, flags, source and
//!   everything written in source). Built once and never mutated, so it can
//!   be read from any thread without locking.
//! - **Resolution state**: two monotonic [`PhaseCell`]s and the
//!   [`DeclSlots`] behind a `RwLock`. Slots are only written while holding
//!   the owning unit's lock (see [`crate::CompilationUnit::slots_mut`]).

use std::fmt;

use bitflags::bitflags;
use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;

use crate::{
    DeclId, Diagnostic, FqName, Phase, PhaseCell, Span, SymbolRef, SyntaxNodeId, TypeExpr,
    TypeSlot,
};

/// Semantic category of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    File,
    Class,
    AnonymousObject,
    TypeAlias,
    Function,
    AnonymousFunction,
    Constructor,
    Property,
    Accessor,
    Parameter,
    TypeParameter,
    EnumEntry,
    Field,
    Initializer,
    LocalVariable,
}

impl DeclKind {
    /// Declarations that own a supertype list.
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            DeclKind::Class | DeclKind::AnonymousObject | DeclKind::TypeAlias
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DeclKind::Function
                | DeclKind::AnonymousFunction
                | DeclKind::Constructor
                | DeclKind::Property
                | DeclKind::Accessor
                | DeclKind::Field
                | DeclKind::LocalVariable
                | DeclKind::EnumEntry
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeclKind::File => "file",
            DeclKind::Class => "class",
            DeclKind::AnonymousObject => "anonymous object",
            DeclKind::TypeAlias => "type alias",
            DeclKind::Function => "function",
            DeclKind::AnonymousFunction => "anonymous function",
            DeclKind::Constructor => "constructor",
            DeclKind::Property => "property",
            DeclKind::Accessor => "accessor",
            DeclKind::Parameter => "parameter",
            DeclKind::TypeParameter => "type parameter",
            DeclKind::EnumEntry => "enum entry",
            DeclKind::Field => "field",
            DeclKind::Initializer => "initializer",
            DeclKind::LocalVariable => "local variable",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flavour of a class declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Object,
    Annotation,
}

/// Where a declaration came from. Decides eligibility for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// Written in source.
    #[default]
    Source,
    /// Generated by the compiler (default accessors, data class members).
    Synthetic,
    /// Copy of an inherited member with substituted type arguments.
    SubstitutionOverride,
    /// Generated for interface delegation; created fully resolved.
    Delegated,
    /// Loaded from a compiled library; created fully resolved.
    Library,
}

impl Origin {
    /// Only declarations of these origins are ever driven through phases.
    pub fn is_available_for_resolve(self) -> bool {
        matches!(
            self,
            Origin::Source | Origin::Synthetic | Origin::SubstitutionOverride
        )
    }
}

bitflags! {
    /// Modifiers written on a declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeclFlags: u16 {
        const PRIVATE = 1 << 0;
        const PROTECTED = 1 << 1;
        const INTERNAL = 1 << 2;
        const ABSTRACT = 1 << 3;
        const OPEN = 1 << 4;
        const SEALED = 1 << 5;
        const OVERRIDE = 1 << 6;
        const INNER = 1 << 7;
        const DATA = 1 << 8;
        /// The callable has an executable body (block or expression).
        const HAS_BODY = 1 << 9;
        /// The callable's body is a single expression (`= expr`).
        const EXPRESSION_BODY = 1 << 10;
    }
}

/// The syntax node a declaration was built from.
///
/// A `fake` source borrows the node of another element: default accessors
/// point at their property, synthetic fields at their class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceElement {
    pub node: SyntaxNodeId,
    pub fake: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
    /// Declarations inside executable code.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Final,
    Open,
    Abstract,
    Sealed,
}

/// Resolved visibility and modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclStatus {
    pub visibility: Visibility,
    pub modality: Modality,
}

/// Kind of a contract effect written on a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// `callsInPlace(param)`
    CallsInPlace,
    /// `returns() implies (param != null)`
    ReturnsImpliesNotNull,
    /// `returnsNotNull()`
    ReturnsNotNull,
}

/// A contract effect as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEffect {
    pub kind: EffectKind,
    /// Parameter the effect talks about, by name.
    pub parameter: Option<String>,
    pub span: Span,
}

impl RawEffect {
    pub fn new(kind: EffectKind, parameter: Option<&str>) -> Self {
        Self {
            kind,
            parameter: parameter.map(str::to_string),
            span: Span::default(),
        }
    }
}

/// A contract effect whose parameter reference has been resolved to the
/// parameter's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedEffect {
    pub kind: EffectKind,
    pub parameter: Option<usize>,
}

/// An import directive of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportDirective {
    /// Dotted path (`app.model.User`) or package for star imports.
    pub path: String,
    pub alias: Option<String>,
    pub is_star: bool,
    pub span: Span,
}

impl ImportDirective {
    pub fn explicit(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
            is_star: false,
            span: Span::default(),
        }
    }

    pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::explicit(path)
        }
    }

    pub fn star(package: impl Into<String>) -> Self {
        Self {
            is_star: true,
            ..Self::explicit(package)
        }
    }

    /// Name the import introduces into file scope (explicit imports only).
    pub fn imported_name(&self) -> Option<&str> {
        if self.is_star {
            return None;
        }
        self.alias
            .as_deref()
            .or_else(|| self.path.rsplit('.').next())
    }
}

/// Result of the imports phase: what each imported name refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    /// Explicitly imported (or aliased) classifiers by the name they introduce.
    pub explicit: FxHashMap<String, SymbolRef>,
    /// Packages imported with `.*`, in declaration order.
    pub star_packages: Vec<String>,
}

impl ImportTable {
    pub fn lookup(&self, name: &str) -> Option<SymbolRef> {
        self.explicit.get(name).copied()
    }
}

/// Mutable resolution results of a declaration.
#[derive(Debug, Clone, Default)]
pub struct DeclSlots {
    /// Supertype references (class-like declarations).
    pub supertypes: Vec<TypeSlot>,
    /// Return type of callables, type of properties, parameters and locals.
    pub return_type: TypeSlot,
    pub receiver_type: Option<TypeSlot>,
    /// Expanded type of a type alias.
    pub expanded_type: Option<TypeSlot>,
    /// Upper bounds of a type parameter.
    pub bounds: Vec<TypeSlot>,
    pub annotations: Vec<TypeSlot>,
    pub status: Option<DeclStatus>,
    pub contract: Option<Vec<ResolvedEffect>>,
    /// Import table (compilation-unit root only).
    pub imports: Option<ImportTable>,
    pub body_resolved: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl DeclSlots {
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }
}

/// A node of the declaration graph.
#[derive(Debug)]
pub struct Declaration {
    pub id: DeclId,
    pub kind: DeclKind,
    pub name: Option<String>,
    /// Back-reference to the owner (arena index, never an owning pointer).
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
    pub origin: Origin,
    pub flags: DeclFlags,
    pub class_kind: Option<ClassKind>,
    pub source: SourceElement,
    /// Set for classifiers with a stable, non-local identity.
    pub fq_name: Option<FqName>,
    /// Nested in executable code.
    pub is_local: bool,
    /// Type of the initializer / expression body, when known from syntax.
    pub initializer: Option<TypeExpr>,
    /// Contract effects as written.
    pub raw_contract: Vec<RawEffect>,
    phase: PhaseCell,
    subtree_phase: PhaseCell,
    slots: RwLock<DeclSlots>,
}

impl Declaration {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: DeclId,
        kind: DeclKind,
        name: Option<String>,
        parent: Option<DeclId>,
        origin: Origin,
        flags: DeclFlags,
        class_kind: Option<ClassKind>,
        source: SourceElement,
        fq_name: Option<FqName>,
        is_local: bool,
        initializer: Option<TypeExpr>,
        raw_contract: Vec<RawEffect>,
        slots: DeclSlots,
    ) -> Self {
        // Declarations that are not driven through phases start fully resolved.
        let initial = if origin.is_available_for_resolve() {
            Phase::Raw
        } else {
            Phase::BodyResolve
        };
        Self {
            id,
            kind,
            name,
            parent,
            children: Vec::new(),
            origin,
            flags,
            class_kind,
            source,
            fq_name,
            is_local,
            initializer,
            raw_contract,
            phase: PhaseCell::new(initial),
            subtree_phase: PhaseCell::new(initial),
            slots: RwLock::new(slots),
        }
    }

    /// Own resolution phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Phase reached by this declaration and everything designated below it.
    #[inline]
    pub fn subtree_phase(&self) -> Phase {
        self.subtree_phase.get()
    }

    pub(crate) fn phase_cell(&self) -> &PhaseCell {
        &self.phase
    }

    pub(crate) fn subtree_phase_cell(&self) -> &PhaseCell {
        &self.subtree_phase
    }

    /// Read the resolution slots. Never blocks on the unit lock.
    pub fn slots(&self) -> RwLockReadGuard<'_, DeclSlots> {
        self.slots.read()
    }

    pub(crate) fn slots_lock(&self) -> &RwLock<DeclSlots> {
        &self.slots
    }

    /// Exclusive access while the declaration is still being built.
    pub(crate) fn slots_get_mut(&mut self) -> &mut DeclSlots {
        self.slots.get_mut()
    }

    pub fn name_or_kind(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }

    pub fn is_interface(&self) -> bool {
        self.class_kind == Some(ClassKind::Interface)
    }

    pub fn is_file(&self) -> bool {
        self.kind == DeclKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_eligibility() {
        assert!(Origin::Source.is_available_for_resolve());
        assert!(Origin::Synthetic.is_available_for_resolve());
        assert!(Origin::SubstitutionOverride.is_available_for_resolve());
        assert!(!Origin::Delegated.is_available_for_resolve());
        assert!(!Origin::Library.is_available_for_resolve());
    }

    #[test]
    fn imported_names() {
        assert_eq!(
            ImportDirective::explicit("a.b.User").imported_name(),
            Some("User")
        );
        assert_eq!(
            ImportDirective::aliased("a.b.User", "U").imported_name(),
            Some("U")
        );
        assert_eq!(ImportDirective::star("a.b").imported_name(), None);
    }

    #[test]
    fn diagnostics_are_deduplicated() {
        let mut slots = DeclSlots::default();
        let diag = Diagnostic::unresolved(Phase::Types, "X", Span::default());
        slots.push_diagnostic(diag.clone());
        slots.push_diagnostic(diag);
        assert_eq!(slots.diagnostics.len(), 1);
    }
}
