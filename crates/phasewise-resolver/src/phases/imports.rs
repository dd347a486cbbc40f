//! Imports phase: file-wise resolution of import directives.
//!
//! This is the last non-lazy phase. It always runs for the whole file,
//! before any lazy phase of any declaration in it.

use tracing::{debug, warn};

use phasewise_core::{
    CompilationUnit, DeclId, Diagnostic, ImportTable, Phase, ResolveError, SymbolId,
    UnitLockGuard,
};
use phasewise_registry::SymbolProvider;

/// Resolve the import directives of `unit` without storing anything.
///
/// Unresolvable directives are reported and left out of the table.
pub fn compute_import_table(
    provider: &dyn SymbolProvider,
    unit: &CompilationUnit,
) -> (ImportTable, Vec<ResolveError>) {
    let mut table = ImportTable::default();
    let mut errors = Vec::new();
    for directive in unit.imports() {
        if directive.is_star {
            if provider.has_package(&directive.path) {
                table.star_packages.push(directive.path.clone());
            } else {
                errors.push(ResolveError::UnresolvedSymbol {
                    name: format!("{}.*", directive.path),
                    span: directive.span,
                });
            }
            continue;
        }
        let found = provider.classifier(SymbolId::classifier(&directive.path));
        match (found, directive.imported_name()) {
            (Some(symbol), Some(name)) => {
                table.explicit.insert(name.to_string(), symbol);
            }
            _ => errors.push(ResolveError::UnresolvedSymbol {
                name: directive.path.clone(),
                span: directive.span,
            }),
        }
    }
    (table, errors)
}

/// Resolve and store the import table of `unit`, then mark the file as
/// past [`Phase::Imports`]. Returns `false` if it was already resolved.
pub fn resolve_file_imports(
    provider: &dyn SymbolProvider,
    unit: &CompilationUnit,
    guard: &UnitLockGuard<'_>,
) -> bool {
    if unit.root().phase() >= Phase::Imports {
        return false;
    }
    let (table, errors) = compute_import_table(provider, unit);
    for error in &errors {
        warn!(unit = %unit.id(), error = %error, "unresolved import");
    }
    debug!(
        unit = %unit.id(),
        explicit = table.explicit.len(),
        star = table.star_packages.len(),
        "resolved imports"
    );
    {
        let mut slots = unit.slots_mut(DeclId::ROOT, guard);
        slots.imports = Some(table);
        for error in errors {
            slots.push_diagnostic(Diagnostic::new(Phase::Imports, error));
        }
    }
    unit.raise_phase(DeclId::ROOT, Phase::Imports, guard);
    true
}
