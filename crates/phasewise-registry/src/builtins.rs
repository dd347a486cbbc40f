//! The implicitly imported `builtins` package.

use phasewise_core::{DeclFlags, DeclId, DeclSpec, Origin, UnitBuilder};

pub const BUILTINS_PACKAGE: &str = "builtins";

/// Classes declared by the builtins unit.
pub const BUILTIN_CLASSES: [&str; 8] = [
    "Any", "Nothing", "Unit", "Boolean", "Int", "Long", "Double", "String",
];

/// Library classes every unit can refer to without an import.
///
/// Library declarations are created fully resolved and are never driven
/// through phases.
pub fn builtins_unit() -> UnitBuilder {
    let mut builder = UnitBuilder::new("<builtins>", BUILTINS_PACKAGE);
    for name in BUILTIN_CLASSES {
        let flags = if name == "Any" {
            DeclFlags::OPEN
        } else {
            DeclFlags::empty()
        };
        builder.add(
            DeclId::ROOT,
            DeclSpec::class(name)
                .with_origin(Origin::Library)
                .with_flags(flags),
        );
    }
    builder
}
