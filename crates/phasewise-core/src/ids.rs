//! Identifier types for compilation units and declarations.
//!
//! - [`UnitId`]: one compilation unit (a source file). Allocated monotonically,
//!   so a rebuilt unit never reuses the id of the unit it replaces.
//! - [`DeclId`]: index of a declaration inside its unit's arena.
//! - [`SymbolRef`]: global declaration identity (unit + declaration).
//! - [`SymbolId`]: deterministic hash of a fully-qualified classifier name.

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Identifies a compilation unit.
///
/// Unit ids also define the global lock order: a thread that holds the lock of
/// one unit may only block on units with a greater id.
///
/// # Example
///
/// ```
/// use phasewise_core::UnitId;
///
/// let unit = UnitId::new(3);
/// assert_eq!(unit.index(), 3);
/// assert!(UnitId::new(2) < unit);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    /// Create a new unit ID with the given index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the underlying index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit_{}", self.0)
    }
}

/// Index of a declaration inside a unit's declaration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    /// The compilation-unit root is always the first declaration.
    pub const ROOT: DeclId = DeclId(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Global identity of a declaration: the unit that owns it plus its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolRef {
    pub unit: UnitId,
    pub decl: DeclId,
}

impl SymbolRef {
    #[inline]
    pub const fn new(unit: UnitId, decl: DeclId) -> Self {
        Self { unit, decl }
    }

    /// Reference to the root declaration of `unit`.
    #[inline]
    pub const fn root_of(unit: UnitId) -> Self {
        Self {
            unit,
            decl: DeclId::ROOT,
        }
    }

    #[inline]
    pub const fn is_root(self) -> bool {
        self.decl.is_root()
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.unit, self.decl)
    }
}

/// Domain marker mixed into classifier hashes so they never collide with
/// other hashed identities.
const CLASSIFIER_DOMAIN: u64 = 0x2fac10b63a6cc57c;

/// Domain marker for package hashes.
const PACKAGE_DOMAIN: u64 = 0x1a095090689d4647;

/// A deterministic 64-bit hash of a fully-qualified name.
///
/// The same name always produces the same id, so references can be indexed
/// before the declaring unit has been built.
///
/// # Examples
///
/// ```
/// use phasewise_core::SymbolId;
///
/// let a = SymbolId::classifier("app.model.User");
/// assert_eq!(a, SymbolId::classifier("app.model.User"));
/// assert_ne!(a, SymbolId::package("app.model.User"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(pub u64);

impl SymbolId {
    /// Hash of a fully-qualified classifier name (`pkg.Outer.Inner`).
    #[inline]
    pub fn classifier(fq_name: &str) -> Self {
        SymbolId(CLASSIFIER_DOMAIN ^ xxh64(fq_name.as_bytes(), 0))
    }

    /// Hash of a package name (`pkg.sub`).
    #[inline]
    pub fn package(package: &str) -> Self {
        SymbolId(PACKAGE_DOMAIN ^ xxh64(package.as_bytes(), 0))
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({:#018x})", self.0)
    }
}
