//! Project, language, and user management routes.
//!
//! Creating and removing projects and managing users needs an admin token.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Project, User};
use crate::state::AppState;

/// Create the project router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects))
        .route("/api/projects/new", post(create_project))
        .route(
            "/api/projects/{project}",
            get(get_project).delete(remove_project),
        )
        .route(
            "/api/projects/{project}/languages",
            get(get_languages).post(set_languages),
        )
        .route("/api/users", get(list_users))
        .route("/api/users/new", post(create_user))
        .route("/api/user", get(current_user))
}

// -------------------------------------------------------------------------
// Request / response types
// -------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateProjectRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    username: String,
    #[serde(default)]
    is_admin: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedUserResponse {
    user: User,
    /// Shown once; only its hash is stored.
    token: String,
}

// -------------------------------------------------------------------------
// Project handlers
// -------------------------------------------------------------------------

async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.projects().list().await?))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.projects().get(&project).await?))
}

async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    user.require_admin()?;
    let project = state
        .projects()
        .create(request.id.as_deref(), &request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn remove_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project): Path<String>,
) -> AppResult<Json<String>> {
    user.require_admin()?;
    state.projects().remove(&project).await?;
    Ok(Json(project))
}

async fn get_languages(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.projects().get_languages(&project).await?))
}

async fn set_languages(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(languages): Json<Vec<String>>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.projects().set_languages(&project, &languages).await?))
}

// -------------------------------------------------------------------------
// User handlers
// -------------------------------------------------------------------------

async fn current_user(user: CurrentUser) -> Json<User> {
    Json(user.0.redacted())
}

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    user.require_admin()?;
    let users = state.users().list().await?;
    Ok(Json(users.iter().map(User::redacted).collect()))
}

async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreatedUserResponse>)> {
    user.require_admin()?;
    let (created, token) = state
        .users()
        .create(&request.username, request.is_admin)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: created.redacted(),
            token,
        }),
    ))
}
