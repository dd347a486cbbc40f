//! Designations: the minimal resolvable unit of work.
//!
//! A designation is the chain of declarations that must be brought to a
//! phase together: the compilation unit root, the enclosing classes
//! (`path`) and the `target`.
//!
//! ```text
//! file                     <- root (imports, annotations only)
//! └── class Outer          <- path[0]
//!     └── class Inner      <- path[1]
//!         └── fun f(x)     <- target
//!             └── x        <- not resolvable: promoted to `f`
//! ```
//!
//! ## Promotion
//!
//! Not every declaration can be resolved on its own. Parameters, type
//! parameters, accessors, primary constructors, initializers and anything
//! with a fake source are resolved as part of their owner. The builder
//! walks the syntax tree upwards from the declaration's node until it finds
//! a node that can be lazily resolved, then maps that node back to its
//! declaration through the unit's [`phasewise_core::LockableCache`].

use std::sync::Arc;

use tracing::trace;

use phasewise_core::{
    CompilationUnit, DeclId, Declaration, NodeKind, Phase, ResolveError, SymbolRef, SyntaxNodeId,
    SyntaxTree,
};

/// The chain to resolve for one request.
#[derive(Debug, Clone)]
pub struct Designation {
    pub unit: Arc<CompilationUnit>,
    /// Declarations strictly between the root and the target, outermost first.
    pub path: Vec<DeclId>,
    pub target: DeclId,
    /// The original request was nested in executable code and promoted.
    pub is_local: bool,
}

impl Designation {
    pub fn symbol(&self) -> SymbolRef {
        self.unit.symbol(self.target)
    }

    pub fn is_file(&self) -> bool {
        self.target.is_root()
    }

    /// Root, path and target, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = DeclId> + '_ {
        std::iter::once(DeclId::ROOT)
            .chain(self.path.iter().copied())
            .chain((!self.target.is_root()).then_some(self.target))
    }

    pub fn on_path(&self, id: DeclId) -> bool {
        self.path.contains(&id)
    }

    /// Highest phase already recorded for the chain.
    ///
    /// Reads phase cells without the lock; a stale value only causes
    /// redundant work that is re-validated under the lock.
    pub fn current_phase(&self) -> Phase {
        reached_phase(&self.unit, self.target)
    }
}

/// Phase `decl` is known to satisfy, from the markers of it and its
/// ancestors.
///
/// The own marker of a declaration with members also moves when it is only
/// an enclosing declaration of some other target, so it only counts for
/// leaves; otherwise the subtree markers decide.
pub fn reached_phase(unit: &CompilationUnit, decl: DeclId) -> Phase {
    let root = unit.root();
    if decl.is_root() {
        return root.phase().max(root.subtree_phase()).satisfied();
    }
    let declaration = unit.get(decl);
    let subtree = std::iter::once(decl)
        .chain(unit.ancestors(decl))
        .map(|id| unit.get(id).subtree_phase())
        .max()
        .unwrap_or(Phase::Raw);
    let own = if has_members(unit, declaration) {
        Phase::Raw
    } else {
        declaration.phase()
    };
    // Files with resolved imports satisfy `Imports` for every member.
    let file = root.phase().min(Phase::LAST_NON_LAZY);
    subtree.max(own).max(file).satisfied()
}

/// Whether a walk targeting `decl` visits anything below it.
fn has_members(unit: &CompilationUnit, decl: &Declaration) -> bool {
    decl.children.iter().any(|child| {
        let member = unit.get(*child);
        !member.is_local && member.origin.is_available_for_resolve()
    })
}

/// Computes designations for declaration references.
pub struct DesignationBuilder;

impl DesignationBuilder {
    /// Whether `decl` sits inside executable code.
    pub fn is_local(unit: &CompilationUnit, decl: DeclId) -> bool {
        unit.get(decl).is_local
    }

    /// Nearest declaration at or above `decl` that can be resolved on its
    /// own, escalating through locals as well.
    pub fn resolvable_target(unit: &CompilationUnit, decl: DeclId) -> Result<DeclId, ResolveError> {
        if decl.is_root() {
            return Ok(DeclId::ROOT);
        }
        let declaration = unit
            .declaration(decl)
            .ok_or(ResolveError::SymbolNotFound {
                symbol: unit.symbol(decl),
            })?;
        let syntax = unit.syntax();
        let start = declaration.source.node;
        let nodes = std::iter::once(start).chain(syntax.ancestors(start));
        for node in nodes {
            if syntax.kind(node) == NodeKind::File {
                break;
            }
            if !can_be_lazily_resolved(syntax, node) {
                continue;
            }
            if let Some(found) = unit.cache().declaration_for(node) {
                if found != decl {
                    trace!(
                        from = %unit.symbol(decl),
                        to = %unit.symbol(found),
                        "promoted declaration to resolvable container"
                    );
                }
                return Ok(found);
            }
        }
        Err(ResolveError::LocalDeclarationUnsupported {
            symbol: unit.symbol(decl),
            kind: declaration.kind,
        })
    }

    /// Designation for `decl`. Declarations inside executable code are
    /// rejected.
    pub fn designate(unit: Arc<CompilationUnit>, decl: DeclId) -> Result<Designation, ResolveError> {
        Self::build(unit, decl, false)
    }

    /// Designation for the nearest non-local container of `decl`.
    pub fn designate_enclosing(
        unit: Arc<CompilationUnit>,
        decl: DeclId,
    ) -> Result<Designation, ResolveError> {
        Self::build(unit, decl, true)
    }

    fn build(
        unit: Arc<CompilationUnit>,
        decl: DeclId,
        allow_local: bool,
    ) -> Result<Designation, ResolveError> {
        let declaration = unit
            .declaration(decl)
            .ok_or(ResolveError::SymbolNotFound {
                symbol: unit.symbol(decl),
            })?;
        let is_local = declaration.is_local;
        if is_local && !allow_local {
            return Err(ResolveError::LocalDeclarationUnsupported {
                symbol: unit.symbol(decl),
                kind: declaration.kind,
            });
        }

        let target = Self::resolvable_target(&unit, decl)?;
        let mut path: Vec<DeclId> = unit
            .ancestors(target)
            .filter(|ancestor| !ancestor.is_root())
            .collect();
        path.reverse();
        Ok(Designation {
            unit,
            path,
            target,
            is_local,
        })
    }
}

/// Whether `node` can be resolved without resolving an enclosing element.
fn can_be_lazily_resolved(syntax: &SyntaxTree, node: SyntaxNodeId) -> bool {
    match syntax.kind(node) {
        NodeKind::File => true,
        NodeKind::FunctionLiteral
        | NodeKind::Object
        | NodeKind::TypeParameter
        | NodeKind::PrimaryConstructor
        | NodeKind::DestructuringEntry
        | NodeKind::Initializer
        | NodeKind::Accessor
        | NodeKind::Block => false,
        NodeKind::Parameter { val_or_var } => {
            // Constructor properties are class members in their own right.
            val_or_var
                && syntax.parent(node).is_some_and(|ctor| {
                    syntax.kind(ctor) == NodeKind::PrimaryConstructor
                        && syntax
                            .parent(ctor)
                            .is_some_and(|class| has_stable_class_id(syntax, class))
                })
        }
        NodeKind::Class
        | NodeKind::TypeAlias
        | NodeKind::Function
        | NodeKind::SecondaryConstructor
        | NodeKind::Property
        | NodeKind::EnumEntry => syntax.parent(node).is_some_and(|parent| {
            syntax.kind(parent) == NodeKind::File || has_stable_class_id(syntax, parent)
        }),
    }
}

/// Named classes reachable from the file through named classes only.
fn has_stable_class_id(syntax: &SyntaxTree, node: SyntaxNodeId) -> bool {
    if syntax.kind(node) != NodeKind::Class {
        return false;
    }
    match syntax.parent(node) {
        Some(parent) if syntax.kind(parent) == NodeKind::File => true,
        Some(parent) => has_stable_class_id(syntax, parent),
        None => false,
    }
}
