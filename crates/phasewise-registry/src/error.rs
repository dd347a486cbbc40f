use thiserror::Error;

use phasewise_core::{SymbolRef, UnitId};

/// Errors raised while adding or replacing compilation units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another unit already declares a classifier with this name.
    #[error("duplicate classifier: {name} is already declared by {existing}")]
    DuplicateClassifier { name: String, existing: SymbolRef },

    /// The unit to replace is not registered.
    #[error("cannot replace {0}: unit is not registered")]
    UnknownUnit(UnitId),

    /// A unit with this path is already registered.
    #[error("duplicate unit path: {0}")]
    DuplicatePath(String),
}
