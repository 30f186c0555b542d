//! HashBrown Kernel Library
//!
//! Content store, connection pipeline, and JSON API of the HashBrown
//! headless CMS. The server binary is `hashbrown`; integration tests build
//! the same router through [`build_router`].

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use store::{MemoryResourceStore, PgResourceStore, ResourceStore, Scope};

/// Build the full application router.
///
/// Middleware layers (last added = first executed in request flow):
/// TraceLayer -> CORS -> body limit -> api_token -> routes
pub fn build_router(state: AppState) -> Router {
    let config = state.config();
    let cors = build_cors_layer(config);
    let body_limit = DefaultBodyLimit::max(config.body_limit_bytes);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::project::router())
        .merge(routes::content::router())
        .merge(routes::connection::router())
        .merge(routes::media::router())
        .merge(routes::schema::router())
        .merge(routes::sync::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate_api_token,
        ))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
            .allow_credentials(true)
    }
}
