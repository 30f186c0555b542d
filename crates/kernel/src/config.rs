//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default JSON body limit (50 MiB). Media uploads travel as base64 inside JSON.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 8080).
    pub port: u16,

    /// PostgreSQL connection URL. When unset, resources live in memory.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Root for relative filesystem deployer paths (default: ./storage).
    pub storage_dir: PathBuf,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,

    /// API token guaranteed to belong to an admin user after startup.
    pub admin_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let storage_dir = env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let body_limit_bytes = match env::var("BODY_LIMIT_BYTES") {
            Ok(v) => v
                .parse()
                .context("BODY_LIMIT_BYTES must be a valid byte count")?,
            Err(_) => DEFAULT_BODY_LIMIT_BYTES,
        };

        let admin_token = env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty());

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            storage_dir,
            cors_allowed_origins,
            body_limit_bytes,
            admin_token,
        })
    }

    /// Configuration for tests and embedded use: in-memory store, no admin token.
    pub fn in_memory(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            database_url: None,
            database_max_connections: 1,
            storage_dir: storage_dir.into(),
            cors_allowed_origins: vec!["*".to_string()],
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            admin_token: None,
        }
    }
}
