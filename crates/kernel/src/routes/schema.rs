//! Schema API routes.

use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::get,
};
use serde::Deserialize;

use super::helpers::{query_flag, require_scope};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::Schema;
use crate::state::AppState;

/// Create the schema router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{project}/{environment}/schemas", get(list_schemas))
        .route("/api/{project}/{environment}/schemas/icons", get(get_icons))
        .route(
            "/api/{project}/{environment}/schemas/{id}",
            get(get_schema).post(set_schema).delete(remove_schema),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetSchemaQuery {
    /// Merge fields inherited from parent schemas.
    #[serde(default, deserialize_with = "query_flag")]
    with_parent_fields: bool,
}

async fn list_schemas(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<Vec<Schema>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.schemas().list(&scope).await?))
}

async fn get_icons(
    State(state): State<AppState>,
    Path((project, environment)): Path<(String, String)>,
) -> AppResult<Json<BTreeMap<String, String>>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.schemas().icons(&scope).await?))
}

async fn get_schema(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
    Query(query): Query<GetSchemaQuery>,
) -> AppResult<Json<Schema>> {
    let scope = require_scope(&state, &project, &environment).await?;
    let schema = if query.with_parent_fields {
        state.schemas().get_resolved(&scope, &id).await?
    } else {
        state.schemas().get(&scope, &id).await?
    };
    Ok(Json(schema))
}

async fn set_schema(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project, environment, id)): Path<(String, String, String)>,
    Json(schema): Json<Schema>,
) -> AppResult<Json<Schema>> {
    let scope = require_scope(&state, &project, &environment).await?;
    Ok(Json(state.schemas().set(&scope, &id, schema, user.name()).await?))
}

async fn remove_schema(
    State(state): State<AppState>,
    Path((project, environment, id)): Path<(String, String, String)>,
) -> AppResult<Json<String>> {
    let scope = require_scope(&state, &project, &environment).await?;
    state.schemas().remove(&scope, &id).await?;
    Ok(Json(id))
}
