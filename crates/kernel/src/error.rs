//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::connection::ConnectionError;
use crate::services::ServiceError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl AppError {
    /// Shorthand for a missing entity of the given kind and id.
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} \"{id}\""))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Connection(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            AppError::Connection(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Connection(ConnectionError::ProjectNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { kind, id } => AppError::not_found(kind, &id),
            ServiceError::Invalid(msg) => AppError::BadRequest(msg),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::Connection(e) => AppError::Connection(e),
            ServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side failures are logged in full and reported vaguely.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                AppError::Internal(e) => tracing::error!(error = ?e, "internal server error"),
                AppError::Database(e) => tracing::error!(error = %e, "database error"),
                other => tracing::error!(error = %other, "request failed"),
            }
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn illegal_path_is_a_bad_request() {
        let err = AppError::from(ConnectionError::IllegalPathComponent {
            name: "id".to_string(),
            reason: "cannot contain \"..\"".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_deployer_is_a_server_error() {
        let err = AppError::from(ConnectionError::MissingDeployer);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_deployer_target_is_not_found() {
        let err = AppError::from(ConnectionError::Deployer(
            crate::connection::DeployerError::NotFound("media/x".to_string()),
        ));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn service_errors_keep_their_meaning() {
        let err = AppError::from(ServiceError::not_found("schema", "page"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "schema \"page\" not found");

        let err = AppError::from(ServiceError::invalid("no languages"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(ServiceError::Conflict("exists".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = AppError::not_found("content", "abc");
        assert_eq!(err.to_string(), "content \"abc\" not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
