//! Implicit types phase: infer the types that were not written.

use tracing::trace;

use phasewise_core::{DeclId, DeclKind, Diagnostic, Phase, ResolveError, ResolvedType, TypeSlot};

use crate::extension::InferenceRequest;
use crate::scope::{CommittedSupertypes, LookupPosition};
use crate::transformer::{DeclTransformer, TransformContext};

#[derive(Debug, Default)]
pub struct ImplicitTypesTransformer;

impl DeclTransformer for ImplicitTypesTransformer {
    fn phase(&self) -> Phase {
        Phase::ImplicitTypesBodyResolve
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        infer_declaration_type(ctx, decl, Phase::ImplicitTypesBodyResolve);
        Ok(())
    }
}

fn has_value_type(kind: DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Function
            | DeclKind::AnonymousFunction
            | DeclKind::Property
            | DeclKind::Accessor
            | DeclKind::Parameter
            | DeclKind::Field
            | DeclKind::LocalVariable
    )
}

/// Replace an `Implicit` type of `decl` through the configured inference.
/// Failed inference leaves an error type and a diagnostic.
pub(crate) fn infer_declaration_type(ctx: &TransformContext<'_>, decl: DeclId, phase: Phase) {
    let unit = ctx.unit;
    let declaration = unit.get(decl);
    if !has_value_type(declaration.kind) || !declaration.slots().return_type.is_implicit() {
        return;
    }

    let mut errors = Vec::new();
    let initializer = declaration.initializer.as_ref().map(|expr| {
        let mut sources = CommittedSupertypes::new(ctx.provider);
        ctx.scope
            .resolve(decl, expr, LookupPosition::Body, &mut sources, &mut errors)
    });
    let property_type = match (declaration.kind, declaration.parent) {
        (DeclKind::Accessor, Some(property)) => {
            unit.get(property).slots().return_type.resolved().cloned()
        }
        _ => None,
    };
    let unit_type = ctx.scope.builtin_type("Unit");

    let inferred = ctx.inference.infer(&InferenceRequest {
        unit,
        decl: declaration,
        initializer: initializer.as_ref(),
        property_type: property_type.as_ref(),
        unit_type: &unit_type,
    });
    let ty = match inferred {
        Some(ty) => ty,
        None => {
            let span = unit.syntax().node(declaration.source.node).span;
            let name = format!("type of {}", declaration.name_or_kind());
            errors.push(ResolveError::UnresolvedSymbol {
                name: name.clone(),
                span,
            });
            ResolvedType::error(name)
        }
    };
    trace!(decl = %unit.symbol(decl), ty = %ty, "inferred type");

    let mut slots = unit.slots_mut(decl, ctx.guard);
    slots.return_type = TypeSlot::Resolved(ty);
    for error in errors {
        slots.push_diagnostic(Diagnostic::new(phase, error));
    }
}
