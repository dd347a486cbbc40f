//! Pluggable phase rules.
//!
//! The resolver owns scheduling; what a phase actually concludes about a
//! declaration can be extended with a [`PhaseExtension`] (called for every
//! declaration a core phase processes) and replaced for inference with a
//! [`TypeInference`].

use phasewise_core::{
    CompilationUnit, DeclFlags, DeclKind, Declaration, Phase, ResolveError, ResolvedType,
    UnitLockGuard,
};

/// Hook invoked after the built-in rules of a core phase ran on a
/// declaration, before the phase is committed.
///
/// `guard` proves the unit lock is held, so the hook may write slots via
/// [`CompilationUnit::slots_mut`]. Returning an error aborts the resolve
/// without committing the phase.
pub trait PhaseExtension: Send + Sync {
    fn on_phase(
        &self,
        phase: Phase,
        unit: &CompilationUnit,
        decl: &Declaration,
        guard: &UnitLockGuard<'_>,
    ) -> Result<(), ResolveError>;
}

/// Everything inference may look at for one declaration.
#[derive(Debug)]
pub struct InferenceRequest<'a> {
    pub unit: &'a CompilationUnit,
    pub decl: &'a Declaration,
    /// Resolved type of the initializer or expression body, if written.
    pub initializer: Option<&'a ResolvedType>,
    /// Resolved type of the owning property, for accessors.
    pub property_type: Option<&'a ResolvedType>,
    /// The builtin `Unit` type.
    pub unit_type: &'a ResolvedType,
}

/// Infers the types of declarations without a written type.
pub trait TypeInference: Send + Sync {
    /// `None` leaves an error type and a diagnostic in the slot.
    fn infer(&self, request: &InferenceRequest<'_>) -> Option<ResolvedType>;
}

/// Syntax-level inference: initializer hints, `Unit` for block bodies,
/// accessor types from their property.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInference;

impl TypeInference for DefaultInference {
    fn infer(&self, request: &InferenceRequest<'_>) -> Option<ResolvedType> {
        if let Some(initializer) = request.initializer {
            return Some(initializer.clone());
        }
        let decl = request.decl;
        match decl.kind {
            DeclKind::Function | DeclKind::AnonymousFunction => {
                if decl.flags.contains(DeclFlags::EXPRESSION_BODY) {
                    None
                } else {
                    Some(request.unit_type.clone())
                }
            }
            DeclKind::Accessor if decl.name.as_deref() == Some("<set>") => {
                Some(request.unit_type.clone())
            }
            DeclKind::Accessor => request.property_type.cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasewise_core::{DeclId, DeclSpec, SymbolRef, TypeExpr, UnitBuilder, UnitId};

    fn infer_for(spec: DeclSpec, initializer: Option<&ResolvedType>) -> Option<ResolvedType> {
        let mut builder = UnitBuilder::new("a.kt", "p");
        let id = builder.add(DeclId::ROOT, spec);
        let unit = builder.build(UnitId::new(0));
        let unit_type = ResolvedType::class(SymbolRef::new(UnitId::new(9), DeclId::new(1)));
        DefaultInference.infer(&InferenceRequest {
            unit: &unit,
            decl: unit.get(id),
            initializer,
            property_type: None,
            unit_type: &unit_type,
        })
    }

    #[test]
    fn block_bodied_function_returns_unit() {
        let ty = infer_for(DeclSpec::function("f").with_block_body(), None).unwrap();
        assert_eq!(ty.class_symbol().map(|s| s.unit), Some(UnitId::new(9)));
    }

    #[test]
    fn initializer_wins() {
        let hint = ResolvedType::error("Hint");
        let ty = infer_for(
            DeclSpec::function("f").with_expression_body(TypeExpr::named("Hint")),
            Some(&hint),
        );
        assert_eq!(ty, Some(hint));
    }

    #[test]
    fn property_without_initializer_is_not_inferred() {
        assert_eq!(infer_for(DeclSpec::property("x"), None), None);
    }
}
