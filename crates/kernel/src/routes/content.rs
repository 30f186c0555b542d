//! Content API routes.
//!
//! Tree CRUD, publishing through connections, sync pull/push, and the
//! advisory edit lease for one project environment.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::helpers::{query_flag, require_scope};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::Content;
use crate::services::connection::PublishReport;
use crate::services::edit_lease::EditLease;
use crate::state::AppState;
use crate::store::category;

/// Create the content router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{project}/{environment}/content", get(list_content))
        .route("/api/{project}/{environment}/content/new", post(create_content))
        .route("/api/{project}/{environment}/content/insert", post(insert_content))
        .route("/api/{project}/{environment}/content/pull/{id}", post(pull_content))
        .route("/api/{project}/{environment}/content/push/{id}", post(push_content))
        .route(
            "/api/{project}/{environment}/content/{id}",
            get(get_content).post(set_content).delete(remove_content),
        )
        .route(
            "/api/{project}/{environment}/content/{id}/ancestors",
            get(get_ancestors),
        )
        .route("/api/{project}/{environment}/content/{id}/publish", post(publish_content))
        .route(
            "/api/{project}/{environment}/content/{id}/unpublish",
            post(unpublish_content),
        )
        .route(
            "/api/{project}/{environment}/content/{id}/heartbeat",
            get(get_lease).post(heartbeat),
        )
}

// -------------------------------------------------------------------------
// Request types
// -------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewQuery {
    schema_id: String,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Deserialize)]
struct SetQuery {
    #[serde(default, deserialize_with = "query_flag")]
    create: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertQuery {
    content_id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    position: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveQuery {
    #[serde(default, deserialize_with = "query_flag")]
    remove_children: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishQuery {
    #[serde(default)]
    connection_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AncestorsQuery {
    #[serde(default, deserialize_with = "query_flag")]
    include_self: bool,
}

// -------------------------------------------------------------------------
// Response types
// -------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemovedResponse {
    removed: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    content: Content,
    connections: Vec<PublishReport>,
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

async fn list_content(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<Vec<Content>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.content().get_all(&scope).await?))
}

async fn get_content(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<Content>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.content().get_by_id(&scope, &id).await?))
}

async fn create_content(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment)): Path<(String, String)>,
    Query(query): Query<NewQuery>,
    body: Bytes,
) -> AppResult<Json<Content>> {
    let scope = require_scope(&state, &project, &environment).await?;

    // Initial properties are optional, sent bare or as `{"properties": {...}}`.
    let mut properties: Map<String, Value> = if body.is_empty() {
        Map::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid properties: {e}")))?
    };
    if let Some(Value::Object(inner)) = properties.get_mut("properties") {
        properties = std::mem::take(inner);
    }

    let content = state
        .content()
        .create(
            &scope,
            &query.schema_id,
            query.parent_id.as_deref(),
            user.name(),
            properties,
        )
        .await?;
    Ok(Json(content))
}

async fn set_content(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<SetQuery>,
    Json(content): Json<Content>,
) -> AppResult<Json<Content>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let saved = state
        .content()
        .set_by_id(&scope, &id, content, user.name(), query.create)
        .await?;
    Ok(Json(saved))
}

async fn insert_content(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment)): Path<(String, String)>,
    Query(query): Query<InsertQuery>,
) -> AppResult<Json<Content>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let content = state
        .content()
        .insert(
            &scope,
            user.name(),
            &query.content_id,
            query.parent_id.as_deref(),
            query.position,
        )
        .await?;
    Ok(Json(content))
}

async fn remove_content(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<RemoveQuery>,
) -> AppResult<Json<RemovedResponse>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let removed = state
        .content()
        .remove_by_id(&scope, &id, query.remove_children)
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

async fn get_ancestors(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<AncestorsQuery>,
) -> AppResult<Json<Vec<Content>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let chain = state
        .content()
        .get_ancestors(&scope, &id, query.include_self)
        .await?;
    Ok(Json(chain))
}

async fn publish_content(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<PublishQuery>,
) -> AppResult<Json<PublishResponse>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let content = state.content().get_by_id(&scope, &id).await?;

    let connections = state
        .connections()
        .publish(&scope, &content, query.connection_id.as_deref())
        .await?;
    let content = state.content().set_published(&scope, &id, true).await?;

    Ok(Json(PublishResponse {
        content,
        connections,
    }))
}

async fn unpublish_content(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<PublishQuery>,
) -> AppResult<Json<PublishResponse>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let content = state.content().get_by_id(&scope, &id).await?;

    let connections = state
        .connections()
        .unpublish(&scope, &content, query.connection_id.as_deref())
        .await?;
    let content = state.content().set_published(&scope, &id, false).await?;

    Ok(Json(PublishResponse {
        content,
        connections,
    }))
}

/// Fetch a node from the remote instance and store it locally.
async fn pull_content(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<Content>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let remote = state
        .sync()
        .get_resource_item(&scope, category::CONTENT, &id)
        .await?;
    let content: Content = serde_json::from_value(remote)
        .map_err(|e| AppError::BadRequest(format!("remote content is malformed: {e}")))?;

    let saved = state
        .content()
        .set_by_id(&scope, &id, content, user.name(), true)
        .await?;
    Ok(Json(saved))
}

/// Send a local node to the remote instance.
async fn push_content(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<String>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let content = state.content().get_by_id(&scope, &id).await?;
    let item = serde_json::to_value(&content).map_err(anyhow::Error::from)?;

    state
        .sync()
        .set_resource_item(&scope, category::CONTENT, &id, &item)
        .await?;
    Ok(Json(id))
}

async fn heartbeat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<EditLease>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.content().heartbeat(&scope, &id, user.name()).await?))
}

/// Who else is editing this node, if anyone.
async fn get_lease(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<Option<EditLease>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.content().lease(&scope, &id, user.name()).await?))
}
