//! Phasewise symbol registry.
//!
//! Owns compilation units and answers classifier lookups for the resolver
//! through the [`SymbolProvider`] trait. Units may be registered eagerly
//! ([`SymbolRegistry::add_unit`]) or as lazy sources built on first use
//! ([`SymbolRegistry::add_source`]).

mod builtins;
mod error;
mod provider;
mod registry;

pub use builtins::{BUILTIN_CLASSES, BUILTINS_PACKAGE, builtins_unit};
pub use error::RegistryError;
pub use provider::{DeclHandle, SymbolProvider};
pub use registry::SymbolRegistry;
