//! Per-phase transformers.
//!
//! One variant per lazy phase, chosen through [`PHASE_TRANSFORMERS`]. The
//! imports phase is file-wise and is driven directly by the resolver.
//!
//! | Phase | Transformer |
//! |---|---|
//! | `SuperTypes` | [`SupertypeTransformer`] |
//! | `SealedClassInheritors` | no-op |
//! | `Types` | [`TypesTransformer`] |
//! | `Status` | [`StatusTransformer`] |
//! | `Contracts` | [`ContractsTransformer`] |
//! | `ImplicitTypesBodyResolve` | [`ImplicitTypesTransformer`] |
//! | `BodyResolve` | [`BodyTransformer`] |
//! | extension phases | skipped, satisfied by the preceding core phase |

pub mod body;
pub mod contracts;
pub mod implicit_types;
pub mod imports;
pub mod status;
pub mod supertypes;
pub mod types;

use phasewise_core::{DeclId, Phase, ResolveError};

use crate::transformer::{DeclTransformer, TransformContext};

pub use body::BodyTransformer;
pub use contracts::ContractsTransformer;
pub use implicit_types::ImplicitTypesTransformer;
pub use status::StatusTransformer;
pub use supertypes::{SupertypeSession, SupertypeTransformer};
pub use types::TypesTransformer;

/// The transformer of one phase run.
pub enum PhaseTransformer<'a> {
    SuperTypes(SupertypeTransformer<'a>),
    /// Nothing to compute without sealed hierarchies; only markers move.
    SealedInheritors,
    Types(TypesTransformer),
    Status(StatusTransformer),
    Contracts(ContractsTransformer),
    ImplicitTypes(ImplicitTypesTransformer),
    Body(BodyTransformer<'a>),
}

/// Builds the transformer of a phase from the context it will run in.
pub type TransformerBuilder = for<'a> fn(&TransformContext<'a>) -> PhaseTransformer<'a>;

/// Phase to transformer table for every core phase after `Imports`.
pub const PHASE_TRANSFORMERS: &[(Phase, TransformerBuilder)] = &[
    (Phase::SuperTypes, build_supertypes),
    (Phase::SealedClassInheritors, build_sealed_inheritors),
    (Phase::Types, build_types),
    (Phase::Status, build_status),
    (Phase::Contracts, build_contracts),
    (Phase::ImplicitTypesBodyResolve, build_implicit_types),
    (Phase::BodyResolve, build_body),
];

/// The builder registered for `phase`, if it is a lazy core phase.
pub fn transformer_builder(phase: Phase) -> Option<TransformerBuilder> {
    PHASE_TRANSFORMERS
        .iter()
        .find(|(registered, _)| *registered == phase)
        .map(|(_, builder)| *builder)
}

fn build_supertypes<'a>(ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    let config = ctx.config;
    PhaseTransformer::SuperTypes(SupertypeTransformer::new(ctx.provider, &config.default_imports))
}

fn build_sealed_inheritors<'a>(_ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    PhaseTransformer::SealedInheritors
}

fn build_types<'a>(_ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    PhaseTransformer::Types(TypesTransformer)
}

fn build_status<'a>(_ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    PhaseTransformer::Status(StatusTransformer)
}

fn build_contracts<'a>(_ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    PhaseTransformer::Contracts(ContractsTransformer)
}

fn build_implicit_types<'a>(_ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    PhaseTransformer::ImplicitTypes(ImplicitTypesTransformer)
}

fn build_body<'a>(ctx: &TransformContext<'a>) -> PhaseTransformer<'a> {
    let config = ctx.config;
    PhaseTransformer::Body(BodyTransformer::new(ctx.provider, &config.default_imports))
}

impl PhaseTransformer<'_> {
    fn inner(&mut self) -> Option<&mut dyn DeclTransformer> {
        match self {
            PhaseTransformer::SuperTypes(t) => Some(t),
            PhaseTransformer::SealedInheritors => None,
            PhaseTransformer::Types(t) => Some(t),
            PhaseTransformer::Status(t) => Some(t),
            PhaseTransformer::Contracts(t) => Some(t),
            PhaseTransformer::ImplicitTypes(t) => Some(t),
            PhaseTransformer::Body(t) => Some(t),
        }
    }
}

impl DeclTransformer for PhaseTransformer<'_> {
    fn phase(&self) -> Phase {
        match self {
            PhaseTransformer::SuperTypes(t) => t.phase(),
            PhaseTransformer::SealedInheritors => Phase::SealedClassInheritors,
            PhaseTransformer::Types(t) => t.phase(),
            PhaseTransformer::Status(t) => t.phase(),
            PhaseTransformer::Contracts(t) => t.phase(),
            PhaseTransformer::ImplicitTypes(t) => t.phase(),
            PhaseTransformer::Body(t) => t.phase(),
        }
    }

    fn transform_path_member(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        match self.inner() {
            Some(inner) => inner.transform_path_member(ctx, decl),
            None => Ok(()),
        }
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        match self.inner() {
            Some(inner) => inner.transform_declaration(ctx, decl),
            None => Ok(()),
        }
    }

    fn descend_into_bodies(&self) -> bool {
        matches!(self, PhaseTransformer::Body(_))
    }

    fn finish(&mut self, ctx: &TransformContext<'_>) -> Result<(), ResolveError> {
        match self.inner() {
            Some(inner) => inner.finish(ctx),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_lazy_core_phase_has_a_transformer() {
        for phase in Phase::ALL {
            let expected = phase > Phase::LAST_NON_LAZY && !phase.is_extension();
            assert_eq!(transformer_builder(phase).is_some(), expected, "{phase}");
        }
    }
}
