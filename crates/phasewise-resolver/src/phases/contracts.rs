//! Contracts phase: bind effect parameter names to parameter positions.

use phasewise_core::{
    CompilationUnit, DeclId, DeclKind, Diagnostic, Phase, ResolveError, ResolvedEffect,
};

use crate::transformer::{DeclTransformer, TransformContext};

#[derive(Debug, Default)]
pub struct ContractsTransformer;

impl DeclTransformer for ContractsTransformer {
    fn phase(&self) -> Phase {
        Phase::Contracts
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        apply_contract(ctx, decl, Phase::Contracts)
    }
}

/// Resolve the contract of `decl`. A contract on anything but a callable
/// fails the phase.
pub(crate) fn apply_contract(
    ctx: &TransformContext<'_>,
    decl: DeclId,
    phase: Phase,
) -> Result<(), ResolveError> {
    let declaration = ctx.unit.get(decl);
    if !declaration.kind.is_callable() {
        if declaration.raw_contract.is_empty() {
            return Ok(());
        }
        return Err(ctx.unexpected(decl, phase));
    }

    let (effects, errors) = resolve_contract(ctx.unit, decl);
    let mut slots = ctx.unit.slots_mut(decl, ctx.guard);
    slots.contract = Some(effects);
    for error in errors {
        slots.push_diagnostic(Diagnostic::new(phase, error));
    }
    Ok(())
}

/// Effects of `decl` with parameter names replaced by positions. Effects
/// naming an unknown parameter are dropped and reported.
pub fn resolve_contract(
    unit: &CompilationUnit,
    decl: DeclId,
) -> (Vec<ResolvedEffect>, Vec<ResolveError>) {
    let declaration = unit.get(decl);
    let parameters: Vec<&str> = declaration
        .children
        .iter()
        .map(|child| unit.get(*child))
        .filter(|child| child.kind == DeclKind::Parameter)
        .map(|child| child.name.as_deref().unwrap_or_default())
        .collect();

    let mut effects = Vec::with_capacity(declaration.raw_contract.len());
    let mut errors = Vec::new();
    for raw in &declaration.raw_contract {
        let parameter = match raw.parameter.as_deref() {
            None => None,
            Some(name) => match parameters.iter().position(|p| *p == name) {
                Some(index) => Some(index),
                None => {
                    errors.push(ResolveError::UnresolvedSymbol {
                        name: name.to_string(),
                        span: raw.span,
                    });
                    continue;
                }
            },
        };
        effects.push(ResolvedEffect {
            kind: raw.kind,
            parameter,
        });
    }
    (effects, errors)
}
