//! Error types for declaration resolution.
//!
//! ## Error Kinds
//!
//! ```text
//! ResolveError
//! ├── LocalDeclarationUnsupported  - programming fault, fail fast
//! ├── ContainingUnitNotFound       - programming fault, fail fast
//! ├── UnitNotFound / SymbolNotFound - provider misuse, fail fast
//! ├── UnexpectedDeclarationKind    - internal-consistency fault, fatal
//! ├── LockOrderViolation           - caller holds a higher unit, fail fast
//! ├── Cancelled                    - expected, caller may retry
//! ├── UnresolvedSymbol             - soft, recorded as an error-type placeholder
//! └── CyclicSupertype              - soft, recorded, edge replaced by `Any`
//! ```
//!
//! Soft kinds never abort a resolve: they are attached to the declaration as
//! [`Diagnostic`]s while resolution continues.

use thiserror::Error;

use crate::{DeclKind, Phase, Span, SymbolRef, UnitId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The target (or its nearest container) is nested in executable code.
    #[error("{kind} {symbol} is local and has no resolvable container")]
    LocalDeclarationUnsupported { symbol: SymbolRef, kind: DeclKind },

    /// The declaration does not belong to any registered compilation unit.
    #[error("no compilation unit contains {symbol}")]
    ContainingUnitNotFound { symbol: SymbolRef },

    /// No unit with this id is registered (it may have been replaced).
    #[error("compilation unit {unit} is not registered")]
    UnitNotFound { unit: UnitId },

    /// The unit exists but has no declaration with this index.
    #[error("{symbol} does not name a declaration")]
    SymbolNotFound { symbol: SymbolRef },

    /// A phase transformer met a declaration kind it cannot handle.
    #[error("phase {phase} cannot handle {kind} {symbol}")]
    UnexpectedDeclarationKind {
        symbol: SymbolRef,
        kind: DeclKind,
        phase: Phase,
    },

    /// Waiting for `unit` would invert the unit lock order.
    #[error("cannot wait for unit {unit} while holding unit {held}")]
    LockOrderViolation { unit: UnitId, held: UnitId },

    /// Cooperative cancellation was observed; `phase` was not committed.
    #[error("resolution cancelled before committing phase {phase}")]
    Cancelled { phase: Phase },

    /// A referenced symbol could not be found.
    #[error("unresolved reference '{name}' at {span}")]
    UnresolvedSymbol { name: String, span: Span },

    /// A supertype edge closes an inheritance cycle.
    #[error("supertype '{name}' at {span} closes an inheritance cycle")]
    CyclicSupertype { name: String, span: Span },
}

impl ResolveError {
    /// Expected conditions that callers handle explicitly.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::Cancelled { .. }
                | ResolveError::UnresolvedSymbol { .. }
                | ResolveError::CyclicSupertype { .. }
        )
    }

    /// Misuse or internal bugs; the current resolve must abort.
    pub fn is_internal_fault(&self) -> bool {
        !self.is_recoverable()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled { .. })
    }
}

/// A soft problem recorded on a declaration during a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub error: ResolveError,
}

impl Diagnostic {
    pub fn new(phase: Phase, error: ResolveError) -> Self {
        Self { phase, error }
    }

    pub fn unresolved(phase: Phase, name: impl Into<String>, span: Span) -> Self {
        Self::new(
            phase,
            ResolveError::UnresolvedSymbol {
                name: name.into(),
                span,
            },
        )
    }
}
