//! Phasewise core data model.
//!
//! Shared types for the declaration resolver: identifiers, the phase
//! sequence, declarations and their slots, compilation units and their
//! locks.
//!
//! ## Modules
//!
//! - [`ids`]: `UnitId`, `DeclId`, `SymbolRef`, `SymbolId`
//! - [`phase`]: the ordered `Phase` enum and atomic `PhaseCell`
//! - [`declaration`]: `Declaration`, `DeclSlots` and their vocabulary
//! - [`unit`]: `CompilationUnit`
//! - [`lock`]: reentrant, order-aware unit locks
//! - [`builder`]: `UnitBuilder` / `DeclSpec`

pub mod builder;
mod cancel;
pub mod declaration;
mod error;
pub mod ids;
pub mod lock;
mod name;
pub mod phase;
mod span;
pub mod syntax;
mod types;
pub mod unit;

pub use builder::{DeclSpec, UnitBuilder};
pub use cancel::CancellationToken;
pub use declaration::{
    ClassKind, DeclFlags, DeclKind, DeclSlots, DeclStatus, Declaration, EffectKind,
    ImportDirective, ImportTable, Modality, Origin, RawEffect, ResolvedEffect, SourceElement,
    Visibility,
};
pub use error::{Diagnostic, ResolveError};
pub use ids::{DeclId, SymbolId, SymbolRef, UnitId};
pub use lock::{LockableCache, UnitLock, UnitLockGuard};
pub use name::{FqName, join_package};
pub use phase::{Phase, PhaseCell};
pub use span::Span;
pub use syntax::{NodeKind, SyntaxNode, SyntaxNodeId, SyntaxTree};
pub use types::{ResolvedType, TypeExpr, TypeSlot};
pub use unit::CompilationUnit;
