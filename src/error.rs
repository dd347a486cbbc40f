use phasewise_core::ResolveError;
use phasewise_registry::RegistryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl Error {
    /// The resolve error, if this is one.
    pub fn as_resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Error::Resolve(error) => Some(error),
            Error::Registry(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.as_resolve_error().is_some_and(ResolveError::is_cancelled)
    }
}
