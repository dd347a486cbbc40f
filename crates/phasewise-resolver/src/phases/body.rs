//! Body phase: declarations inside executable code.
//!
//! Locals never go through the lazy phases on their own. Here every local
//! declaration of the target catches up on all of them at once, and local
//! classes get their supertypes through a session of their own.

use phasewise_core::{DeclFlags, DeclId, Phase, ResolveError};
use phasewise_registry::SymbolProvider;

use crate::phases::contracts::apply_contract;
use crate::phases::implicit_types::infer_declaration_type;
use crate::phases::status::apply_status;
use crate::phases::supertypes::SupertypeSession;
use crate::phases::types::resolve_declaration_types;
use crate::transformer::{DeclTransformer, TransformContext};

pub struct BodyTransformer<'a> {
    session: SupertypeSession<'a>,
}

impl<'a> BodyTransformer<'a> {
    pub fn new(provider: &'a dyn SymbolProvider, default_imports: &'a [String]) -> Self {
        Self {
            session: SupertypeSession::new(provider, default_imports),
        }
    }

    fn resolve_local(&mut self, ctx: &TransformContext<'_>, decl: DeclId) -> Result<(), ResolveError> {
        let phase = Phase::BodyResolve;
        if ctx.unit.get(decl).kind.is_class_like() {
            self.session.resolve(ctx, &[ctx.unit.symbol(decl)])?;
        }
        resolve_declaration_types(ctx, decl, phase);
        apply_status(ctx, decl);
        apply_contract(ctx, decl, phase)?;
        infer_declaration_type(ctx, decl, phase);
        Ok(())
    }
}

impl DeclTransformer for BodyTransformer<'_> {
    fn phase(&self) -> Phase {
        Phase::BodyResolve
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        let declaration = ctx.unit.get(decl);
        if declaration.is_local {
            self.resolve_local(ctx, decl)?;
        }
        if declaration.flags.contains(DeclFlags::HAS_BODY) || declaration.initializer.is_some() {
            ctx.unit.slots_mut(decl, ctx.guard).body_resolved = true;
        }
        Ok(())
    }

    fn descend_into_bodies(&self) -> bool {
        true
    }
}
