//! Types phase: explicit type references of declarations.

use phasewise_core::{
    DeclId, DeclKind, Diagnostic, Phase, ResolveError, ResolvedType, TypeSlot,
};

use crate::scope::{CommittedSupertypes, LookupPosition};
use crate::transformer::{DeclTransformer, TransformContext};

/// Resolves written return, receiver, bound and annotation types.
/// `Implicit` slots stay implicit.
#[derive(Debug, Default)]
pub struct TypesTransformer;

impl DeclTransformer for TypesTransformer {
    fn phase(&self) -> Phase {
        Phase::Types
    }

    fn transform_path_member(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        resolve_annotations(ctx, decl, Phase::Types);
        Ok(())
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        resolve_declaration_types(ctx, decl, Phase::Types);
        Ok(())
    }
}

/// Resolve the annotation types of `decl`, reporting under `phase`.
pub(crate) fn resolve_annotations(ctx: &TransformContext<'_>, decl: DeclId, phase: Phase) {
    let annotations = ctx.unit.get(decl).slots().annotations.clone();
    if annotations.iter().all(TypeSlot::is_settled) {
        return;
    }
    let mut errors = Vec::new();
    let resolved: Vec<TypeSlot> = annotations
        .into_iter()
        .map(|slot| resolve_slot(ctx, decl, slot, &mut errors))
        .collect();

    let mut slots = ctx.unit.slots_mut(decl, ctx.guard);
    slots.annotations = resolved;
    for error in errors {
        slots.push_diagnostic(Diagnostic::new(phase, error));
    }
}

/// Resolve every written type of `decl`, reporting under `phase`.
pub(crate) fn resolve_declaration_types(ctx: &TransformContext<'_>, decl: DeclId, phase: Phase) {
    let unit = ctx.unit;
    let declaration = unit.get(decl);
    let current = declaration.slots().clone();
    let mut errors = Vec::new();

    let mut return_type = resolve_slot(ctx, decl, current.return_type, &mut errors);
    if return_type.is_implicit() {
        if let Some(owner) = implied_owner_type(ctx, decl) {
            return_type = TypeSlot::Resolved(owner);
        }
    }
    let receiver_type = current
        .receiver_type
        .map(|slot| resolve_slot(ctx, decl, slot, &mut errors));
    let bounds: Vec<TypeSlot> = current
        .bounds
        .into_iter()
        .map(|slot| resolve_slot(ctx, decl, slot, &mut errors))
        .collect();
    let annotations: Vec<TypeSlot> = current
        .annotations
        .into_iter()
        .map(|slot| resolve_slot(ctx, decl, slot, &mut errors))
        .collect();

    let mut slots = unit.slots_mut(decl, ctx.guard);
    slots.return_type = return_type;
    slots.receiver_type = receiver_type;
    slots.bounds = bounds;
    slots.annotations = annotations;
    for error in errors {
        slots.push_diagnostic(Diagnostic::new(phase, error));
    }
}

fn resolve_slot(
    ctx: &TransformContext<'_>,
    decl: DeclId,
    slot: TypeSlot,
    errors: &mut Vec<ResolveError>,
) -> TypeSlot {
    match slot {
        TypeSlot::Unresolved(expr) => {
            let mut sources = CommittedSupertypes::new(ctx.provider);
            let ty = ctx
                .scope
                .resolve(decl, &expr, LookupPosition::Body, &mut sources, errors);
            TypeSlot::Resolved(ty)
        }
        settled => settled,
    }
}

/// Constructors have the type of their class, enum entries the type of
/// their enum.
fn implied_owner_type(ctx: &TransformContext<'_>, decl: DeclId) -> Option<ResolvedType> {
    let unit = ctx.unit;
    match unit.get(decl).kind {
        DeclKind::Constructor | DeclKind::EnumEntry => unit
            .ancestors(decl)
            .find(|ancestor| unit.get(*ancestor).kind.is_class_like())
            .map(|owner| ResolvedType::class(unit.symbol(owner))),
        _ => None,
    }
}
