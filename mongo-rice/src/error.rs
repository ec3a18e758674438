//! Crate-level error type

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate [`enum@Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from loading configuration, initialising logging and building repositories
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Tracing subscriber could not be installed
    #[error("Tracing error: {0}")]
    Tracing(String),

    /// Structured repository error with operation context
    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// The repository error, if this is one
    pub fn as_repository_error(&self) -> Option<&RepositoryError> {
        match self {
            Self::Repository(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{RepositoryErrorKind, RepositoryOperation};

    #[test]
    fn test_repository_error_converts() {
        let err: Error = RepositoryError::cancelled(RepositoryOperation::FindPage).into();
        assert_eq!(
            err.as_repository_error().map(|e| e.kind),
            Some(RepositoryErrorKind::Cancelled)
        );
        assert!(err.to_string().starts_with("Repository cancelled error during find_page"));
    }

    #[test]
    fn test_tracing_error_is_not_a_repository_error() {
        let err = Error::Tracing("subscriber already set".to_string());
        assert_eq!(err.to_string(), "Tracing error: subscriber already set");
        assert!(err.as_repository_error().is_none());
    }
}
