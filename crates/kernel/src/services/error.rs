//! Service layer error type.

use thiserror::Error;

use crate::connection::ConnectionError;

/// Errors returned by the resource services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The addressed resource does not exist.
    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: &'static str, id: String },

    /// The request is well-formed but not acceptable.
    #[error("{0}")]
    Invalid(String),

    /// The request conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result type alias using ServiceError.
pub type ServiceResult<T> = Result<T, ServiceError>;
