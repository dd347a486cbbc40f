//! Phasewise: incremental, phase-ordered declaration resolution.
//!
//! Declarations are resolved lazily and only as far as a request needs:
//! asking for the types of one method resolves the supertypes of its class
//! and the types of that method, and leaves every sibling alone.
//!
//! ## Crates
//!
//! - `phasewise-core`: data model (declarations, phases, units, locks)
//! - `phasewise-registry`: symbol provider and unit storage
//! - `phasewise-resolver`: designations, phase transformers, the driver
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use phasewise::prelude::*;
//!
//! let registry = Arc::new(SymbolRegistry::with_builtins());
//! let mut file = UnitBuilder::new("shapes.kt", "shapes");
//! let shape = file.add(DeclId::ROOT, DeclSpec::interface("Shape"));
//! let circle = file.add(
//!     DeclId::ROOT,
//!     DeclSpec::class("Circle").with_supertype(TypeExpr::named("Shape")),
//! );
//! let unit = registry.add_unit(file)?;
//!
//! let resolver = Resolver::new(registry.clone(), ResolverConfig::default());
//! resolver.resolve(unit.symbol(circle), Phase::SuperTypes, false)?;
//!
//! let slots = unit.get(circle).slots();
//! assert_eq!(
//!     slots.supertypes[0].resolved(),
//!     Some(&ResolvedType::class(unit.symbol(shape)))
//! );
//! # Ok::<(), phasewise::Error>(())
//! ```

mod error;

pub use error::{Error, Result};

pub use phasewise_core as core;
pub use phasewise_registry as registry;
pub use phasewise_resolver as resolver;

/// The types needed to build units and resolve them.
pub mod prelude {
    pub use phasewise_core::{
        CancellationToken, CompilationUnit, DeclFlags, DeclId, DeclKind, DeclSpec, DeclStatus,
        Diagnostic, EffectKind, FqName, ImportDirective, Modality, Origin, Phase, RawEffect,
        ResolveError, ResolvedType, SymbolRef, TypeExpr, TypeSlot, UnitBuilder, UnitId,
        Visibility,
    };
    pub use phasewise_registry::{RegistryError, SymbolProvider, SymbolRegistry};
    pub use phasewise_resolver::{
        PhaseExtension, Resolver, ResolverConfig, StatsSnapshot, TypeInference,
    };
}
