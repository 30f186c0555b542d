//! Connection API routes.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::helpers::{query_flag, require_scope};
use crate::connection::ConnectionRecord;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::connection::SaveOptions;
use crate::services::edit_lease::EditLease;
use crate::state::AppState;
use crate::store::category;

/// Create the connection router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{project}/{environment}/connections", get(list_connections))
        .route(
            "/api/{project}/{environment}/connections/new",
            post(create_connection),
        )
        .route(
            "/api/{project}/{environment}/connections/processors",
            get(list_processors),
        )
        .route(
            "/api/{project}/{environment}/connections/deployers",
            get(list_deployers),
        )
        .route(
            "/api/{project}/{environment}/connections/{id}",
            get(get_connection)
                .post(save_connection)
                .delete(remove_connection),
        )
        .route(
            "/api/{project}/{environment}/connections/{id}/heartbeat",
            post(heartbeat),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveQuery {
    #[serde(default, deserialize_with = "query_flag")]
    is_media_provider: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AliasesResponse {
    aliases: Vec<String>,
}

async fn list_connections(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<Vec<ConnectionRecord>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.connections().list(&scope).await?))
}

async fn get_connection(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<ConnectionRecord>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.connections().get(&scope, &id).await?))
}

async fn create_connection(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<ConnectionRecord>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.connections().create(&scope, user.name()).await?))
}

async fn save_connection(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<SaveQuery>,
    Json(record): Json<ConnectionRecord>,
) -> AppResult<Json<ConnectionRecord>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let options = SaveOptions {
        is_media_provider: query.is_media_provider,
    };
    let saved = state
        .connections()
        .save(&scope, &id, record, user.name(), options)
        .await?;
    Ok(Json(saved))
}

async fn remove_connection(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<String>> {
    let scope = require_scope(&state, &project, &environment).await?;
    state.connections().remove(&scope, &id).await?;
    Ok(Json(id))
}

async fn heartbeat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<EditLease>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let lease = state
        .leases()
        .heartbeat(&scope, category::CONNECTIONS, &id, user.name())
        .await?;
    Ok(Json(lease))
}

async fn list_processors(State(state): State<AppState>) -> Json<AliasesResponse> {
    Json(AliasesResponse {
        aliases: state.registry().processor_aliases(),
    })
}

async fn list_deployers(State(state): State<AppState>) -> Json<AliasesResponse> {
    Json(AliasesResponse {
        aliases: state.registry().deployer_aliases(),
    })
}
