//! The fixed, ordered sequence of analysis phases.
//!
//! Phase positions are a versioned contract: consumers refer to phases by
//! their position in this enumeration, so inserting a phase means renumbering
//! every consumer.
//!
//! ```text
//!  0 Raw
//!  1 Imports                      (file-wise, last non-lazy phase)
//!  2 AnnotationsForExtensions     (extension)
//!  3 SuperTypes
//!  4 SealedClassInheritors
//!  5 Types
//!  6 ExtensionStatusUpdate        (extension)
//!  7 Status
//!  8 Contracts
//!  9 NewMembersGeneration         (extension)
//! 10 ImplicitTypesBodyResolve
//! 11 BodyResolve
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// One step in the total order of semantic analysis passes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum Phase {
    /// Declarations exist as built from syntax; nothing is resolved.
    Raw = 0,
    /// Import directives of a whole file are resolved.
    Imports = 1,
    /// Reserved for extensions.
    AnnotationsForExtensions = 2,
    /// Class supertypes and type alias expansions are resolved.
    SuperTypes = 3,
    /// Sealed class inheritor lists.
    SealedClassInheritors = 4,
    /// Explicitly written types in signatures are resolved.
    Types = 5,
    /// Reserved for extensions.
    ExtensionStatusUpdate = 6,
    /// Visibility and modality are resolved.
    Status = 7,
    /// Function contracts are resolved.
    Contracts = 8,
    /// Reserved for extensions.
    NewMembersGeneration = 9,
    /// Implicit (inferred) signature types are resolved.
    ImplicitTypesBodyResolve = 10,
    /// Executable bodies are resolved.
    BodyResolve = 11,
}

impl Phase {
    /// Every phase, in order.
    pub const ALL: [Phase; 12] = [
        Phase::Raw,
        Phase::Imports,
        Phase::AnnotationsForExtensions,
        Phase::SuperTypes,
        Phase::SealedClassInheritors,
        Phase::Types,
        Phase::ExtensionStatusUpdate,
        Phase::Status,
        Phase::Contracts,
        Phase::NewMembersGeneration,
        Phase::ImplicitTypesBodyResolve,
        Phase::BodyResolve,
    ];

    /// The last phase that is always run for a whole file rather than
    /// lazily for a designation.
    pub const LAST_NON_LAZY: Phase = Phase::Imports;

    /// Position of this phase in the sequence.
    #[inline]
    pub fn position(self) -> u8 {
        self.into()
    }

    /// The following phase, or `None` for [`Phase::BodyResolve`].
    pub fn next(self) -> Option<Phase> {
        Phase::ALL.get(self.position() as usize + 1).copied()
    }

    /// The preceding phase, or `None` for [`Phase::Raw`].
    pub fn previous(self) -> Option<Phase> {
        (self.position() as usize)
            .checked_sub(1)
            .map(|index| Phase::ALL[index])
    }

    /// Extension phases are handled outside this engine and treated as
    /// already satisfied.
    #[inline]
    pub fn is_extension(self) -> bool {
        matches!(
            self,
            Phase::AnnotationsForExtensions
                | Phase::ExtensionStatusUpdate
                | Phase::NewMembersGeneration
        )
    }

    /// Phases that are run lazily for a designation (everything after
    /// [`Phase::LAST_NON_LAZY`] that is not an extension).
    #[inline]
    pub fn is_lazy(self) -> bool {
        self > Phase::LAST_NON_LAZY && !self.is_extension()
    }

    /// The highest phase satisfied once `self` is reached: extension
    /// phases directly following it come for free.
    pub fn satisfied(self) -> Phase {
        let mut reached = self;
        while let Some(next) = reached.next().filter(|next| next.is_extension()) {
            reached = next;
        }
        reached
    }

    /// Phases strictly after `self` up to and including `to`, in order.
    pub fn range_to(self, to: Phase) -> impl Iterator<Item = Phase> {
        Phase::ALL
            .into_iter()
            .filter(move |phase| *phase > self && *phase <= to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Raw => "raw",
            Phase::Imports => "imports",
            Phase::AnnotationsForExtensions => "annotations-for-extensions",
            Phase::SuperTypes => "supertypes",
            Phase::SealedClassInheritors => "sealed-class-inheritors",
            Phase::Types => "types",
            Phase::ExtensionStatusUpdate => "extension-status-update",
            Phase::Status => "status",
            Phase::Contracts => "contracts",
            Phase::NewMembersGeneration => "new-members-generation",
            Phase::ImplicitTypesBodyResolve => "implicit-types-body",
            Phase::BodyResolve => "body",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomically updated, monotonic phase marker.
///
/// Reads are allowed without holding the unit lock; a stale read only leads
/// to redundant work that is re-validated under the lock.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new(phase: Phase) -> Self {
        Self(AtomicU8::new(phase.into()))
    }

    #[inline]
    pub fn get(&self) -> Phase {
        let raw = self.0.load(Ordering::Acquire);
        Phase::try_from(raw).unwrap_or_else(|e| panic!("corrupt phase cell: {e}"))
    }

    /// Raise the marker to `phase` if it is lower. Returns the previous value.
    ///
    /// Lowering is impossible: the update is a `max` merge.
    #[inline]
    pub fn raise(&self, phase: Phase) -> Phase {
        let previous = self.0.fetch_max(phase.into(), Ordering::AcqRel);
        Phase::try_from(previous).unwrap_or_else(|e| panic!("corrupt phase cell: {e}"))
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new(Phase::Raw)
    }
}
