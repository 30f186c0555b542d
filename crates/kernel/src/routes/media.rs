//! Media API routes.
//!
//! Media lives in whichever connection is the environment's media provider.

use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::helpers::{query_flag, require_scope};
use crate::error::AppResult;
use crate::state::AppState;

/// Create the media router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{project}/{environment}/media", get(list_media))
        .route(
            "/api/{project}/{environment}/media/provider",
            get(get_provider).post(set_provider),
        )
        .route(
            "/api/{project}/{environment}/media/{id}",
            get(get_media).post(set_media).delete(remove_media),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetMediaQuery {
    #[serde(default, deserialize_with = "query_flag")]
    ensure_web_url: bool,
}

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    base64: String,
    #[serde(default)]
    clear: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderBody {
    #[serde(default)]
    connection_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaUrlResponse {
    id: String,
    url: Option<String>,
}

async fn list_media(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<BTreeMap<String, String>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let provider = state.connections().media_provider(&scope).await?;
    Ok(Json(provider.get_all_media_urls().await?))
}

async fn get_media(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<GetMediaQuery>,
) -> AppResult<Json<MediaUrlResponse>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let provider = state.connections().media_provider(&scope).await?;
    let url = provider.get_media_url(&id, query.ensure_web_url).await?;
    Ok(Json(MediaUrlResponse { id, url }))
}

async fn set_media(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Json(upload): Json<UploadRequest>,
) -> AppResult<Json<MediaUrlResponse>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let provider = state.connections().media_provider(&scope).await?;

    provider
        .set_media(&id, &upload.name, &upload.base64, upload.clear)
        .await?;
    let url = provider.get_media_url(&id, false).await?;
    Ok(Json(MediaUrlResponse { id, url }))
}

async fn remove_media(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<String>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let provider = state.connections().media_provider(&scope).await?;
    provider.remove_media(&id).await?;
    Ok(Json(id))
}

async fn get_provider(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<ProviderBody>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(ProviderBody {
        connection_id: state.projects().get_media_provider(&scope).await?,
    }))
}

async fn set_provider(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
    Json(body): Json<ProviderBody>,
) -> AppResult<Json<ProviderBody>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let connection_id = body.connection_id.filter(|id| !id.is_empty());

    if let Some(id) = connection_id.as_deref() {
        state.connections().get(&scope, id).await?;
    }
    state
        .projects()
        .set_media_provider(&scope, connection_id.as_deref())
        .await?;
    Ok(Json(ProviderBody { connection_id }))
}
