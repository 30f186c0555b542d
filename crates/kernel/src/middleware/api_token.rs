//! API token authentication middleware.
//!
//! Every `/api/...` request must carry `Authorization: Bearer <token>`.
//! A valid token injects a [`CurrentUser`] extension for downstream handlers.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// The user a request was authenticated as.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Name stamped on resources this user changes.
    pub fn name(&self) -> &str {
        &self.0.username
    }

    /// Reject non-admins with 403.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Extract the raw token from a bearer `Authorization` header.
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that authenticates `/api/...` requests via bearer token.
///
/// - Valid token -> [`CurrentUser`] extension, request continues
/// - Missing, invalid, or expired token -> 401 JSON error
/// - Paths outside `/api/` pass through untouched
pub async fn authenticate_api_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with("/api/") {
        return next.run(request).await;
    }

    let Some(raw_token) = bearer_token(&request).map(str::to_owned) else {
        return AppError::Unauthorized.into_response();
    };

    match state.users().authenticate(&raw_token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => AppError::Unauthorized.into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/projects");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(&request(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request(Some("Bearer  "))), None);
        assert_eq!(bearer_token(&request(None)), None);
    }

    #[test]
    fn only_admins_pass_admin_check() {
        let admin = CurrentUser(User::new("1", "root", true));
        let editor = CurrentUser(User::new("2", "ed", false));
        assert!(admin.require_admin().is_ok());
        assert!(matches!(editor.require_admin(), Err(AppError::Forbidden)));
        assert_eq!(editor.name(), "ed");
    }
}
