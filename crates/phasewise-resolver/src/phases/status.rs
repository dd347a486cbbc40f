//! Status phase: visibility and modality.

use phasewise_core::{
    CompilationUnit, DeclFlags, DeclId, DeclKind, DeclStatus, Declaration, Modality, Phase,
    ResolveError, Visibility,
};

use crate::transformer::{DeclTransformer, TransformContext};

#[derive(Debug, Default)]
pub struct StatusTransformer;

impl DeclTransformer for StatusTransformer {
    fn phase(&self) -> Phase {
        Phase::Status
    }

    /// The own marker of an enclosing class moves with this walk, so its
    /// status is computed here as well.
    fn transform_path_member(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        apply_status(ctx, decl);
        Ok(())
    }

    fn transform_declaration(
        &mut self,
        ctx: &TransformContext<'_>,
        decl: DeclId,
    ) -> Result<(), ResolveError> {
        apply_status(ctx, decl);
        Ok(())
    }
}

pub(crate) fn apply_status(ctx: &TransformContext<'_>, decl: DeclId) {
    let status = compute_status(ctx.unit, decl);
    ctx.unit.slots_mut(decl, ctx.guard).status = Some(status);
}

/// Status of `decl` from its modifiers and its owner.
pub fn compute_status(unit: &CompilationUnit, decl: DeclId) -> DeclStatus {
    let declaration = unit.get(decl);
    DeclStatus {
        visibility: visibility(declaration),
        modality: modality(unit, declaration),
    }
}

fn visibility(decl: &Declaration) -> Visibility {
    let flags = decl.flags;
    if decl.is_local {
        Visibility::Local
    } else if flags.contains(DeclFlags::PRIVATE) {
        Visibility::Private
    } else if flags.contains(DeclFlags::PROTECTED) {
        Visibility::Protected
    } else if flags.contains(DeclFlags::INTERNAL) {
        Visibility::Internal
    } else {
        Visibility::Public
    }
}

fn modality(unit: &CompilationUnit, decl: &Declaration) -> Modality {
    let flags = decl.flags;
    if flags.contains(DeclFlags::ABSTRACT) {
        return Modality::Abstract;
    }
    if flags.contains(DeclFlags::SEALED) {
        return Modality::Sealed;
    }
    if flags.contains(DeclFlags::OPEN) {
        return Modality::Open;
    }
    if decl.is_interface() {
        return Modality::Abstract;
    }
    let in_interface = decl.parent.is_some_and(|owner| unit.get(owner).is_interface());
    if in_interface && matches!(decl.kind, DeclKind::Function | DeclKind::Property) {
        return if decl.flags.contains(DeclFlags::HAS_BODY) || decl.initializer.is_some() {
            Modality::Open
        } else {
            Modality::Abstract
        };
    }
    if flags.contains(DeclFlags::OVERRIDE) {
        return Modality::Open;
    }
    Modality::Final
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasewise_core::{DeclSpec, UnitBuilder, UnitId};

    #[test]
    fn explicit_modifiers_win() {
        let mut b = UnitBuilder::new("a.kt", "p");
        let a = b.add(DeclId::ROOT, DeclSpec::class("A").with_flags(DeclFlags::OPEN));
        let f = b.add(
            a,
            DeclSpec::function("f").with_flags(DeclFlags::PRIVATE | DeclFlags::ABSTRACT),
        );
        let g = b.add(a, DeclSpec::function("g").with_flags(DeclFlags::OVERRIDE));
        let h = b.add(a, DeclSpec::function("h").with_flags(DeclFlags::INTERNAL));
        let unit = b.build(UnitId::new(0));

        assert_eq!(
            compute_status(&unit, a),
            DeclStatus {
                visibility: Visibility::Public,
                modality: Modality::Open
            }
        );
        assert_eq!(
            compute_status(&unit, f),
            DeclStatus {
                visibility: Visibility::Private,
                modality: Modality::Abstract
            }
        );
        assert_eq!(compute_status(&unit, g).modality, Modality::Open);
        assert_eq!(compute_status(&unit, h).visibility, Visibility::Internal);
        assert_eq!(compute_status(&unit, h).modality, Modality::Final);
    }

    #[test]
    fn interface_members() {
        // interface I { fun a(); fun b() { } }
        let mut b = UnitBuilder::new("a.kt", "p");
        let i = b.add(DeclId::ROOT, DeclSpec::interface("I"));
        let abstract_fn = b.add(i, DeclSpec::function("a"));
        let default_fn = b.add(i, DeclSpec::function("b").with_block_body());
        let unit = b.build(UnitId::new(0));

        assert_eq!(compute_status(&unit, i).modality, Modality::Abstract);
        assert_eq!(compute_status(&unit, abstract_fn).modality, Modality::Abstract);
        assert_eq!(compute_status(&unit, default_fn).modality, Modality::Open);
    }

    #[test]
    fn locals_have_local_visibility() {
        let mut b = UnitBuilder::new("a.kt", "p");
        let f = b.add(DeclId::ROOT, DeclSpec::function("f"));
        let x = b.add_local(f, DeclSpec::local_variable("x"));
        let unit = b.build(UnitId::new(0));

        assert_eq!(compute_status(&unit, x).visibility, Visibility::Local);
    }
}
