//! Phasewise resolver.
//!
//! Lazily brings declarations to a requested analysis phase, resolving only
//! the chain of declarations the request depends on.
//!
//! ## Architecture
//!
//! ```text
//! Resolver::resolve(symbol, phase)
//!     │
//!     ├── DesignationBuilder ──► Designation (root, path, target)
//!     │
//!     └── per phase, under the unit lock:
//!           PHASE_TRANSFORMERS[phase] ──► DesignationWalker ──► commit
//!                  │
//!                  └── SupertypeSession (cross-declaration, cycle-safe)
//! ```
//!
//! ## Modules
//!
//! - [`designation`]: promotion of declarations to resolvable targets
//! - [`transformer`]: restricted traversal shared by every phase
//! - [`phases`]: one transformer per phase
//! - [`scope`]: type name lookup
//! - [`driver`]: the [`Resolver`]

pub mod config;
pub mod designation;
pub mod driver;
pub mod extension;
pub mod phases;
pub mod scope;
pub mod stats;
pub mod transformer;

pub use config::ResolverConfig;
pub use designation::{Designation, DesignationBuilder};
pub use driver::Resolver;
pub use extension::{DefaultInference, InferenceRequest, PhaseExtension, TypeInference};
pub use phases::{PhaseTransformer, SupertypeSession};
pub use scope::{Classifier, LookupPosition, TypeScope};
pub use stats::{ResolveStats, StatsSnapshot};
pub use transformer::{DeclTransformer, DesignationWalker, TransformContext};
