//! Sync settings routes.

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::get,
};

use super::helpers::require_scope;
use crate::error::AppResult;
use crate::models::SyncSettings;
use crate::state::AppState;

/// Create the sync router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/{project}/{environment}/sync",
        get(get_settings).post(set_settings),
    )
}

async fn get_settings(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<SyncSettings>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.projects().get_sync_settings(&scope).await?))
}

async fn set_settings(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
    Json(settings): Json<SyncSettings>,
) -> AppResult<Json<SyncSettings>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.projects().set_sync_settings(&scope, settings).await?))
}
