//! User service and API token lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use tracing::info;

use super::{ServiceError, ServiceResult};
use crate::models::user::{generate_token, hash_token};
use crate::models::{StoredToken, User};
use crate::store::{self, ResourceStore, Scope, category};

/// Token lookups are cached this long. Revoked tokens may stay valid for
/// up to this duration.
const TOKEN_CACHE_TTL_SECS: u64 = 60;

const TOKEN_CACHE_CAPACITY: u64 = 10_000;

/// Username given to the bootstrap admin.
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// User service.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn ResourceStore>,
    /// Token hash to user (or `None` for unknown tokens).
    tokens: Cache<String, Option<User>>,
}

impl UserService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        let tokens = Cache::builder()
            .time_to_live(Duration::from_secs(TOKEN_CACHE_TTL_SECS))
            .max_capacity(TOKEN_CACHE_CAPACITY)
            .build();
        Self { store, tokens }
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        Ok(store::load_all(&*self.store, &Scope::global(), category::USERS).await?)
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|u| u.username == username))
    }

    async fn save(&self, user: &User) -> ServiceResult<()> {
        store::save(&*self.store, &Scope::global(), category::USERS, &user.id, user).await?;
        self.tokens.invalidate_all();
        Ok(())
    }

    /// Create a user with one fresh token. Returns the user and the raw token.
    pub async fn create(&self, username: &str, is_admin: bool) -> ServiceResult<(User, String)> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::invalid("username must not be empty"));
        }
        if self.find_by_username(username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "user \"{username}\" already exists"
            )));
        }

        let raw_token = generate_token();
        let mut user = User::new(uuid::Uuid::new_v4().simple().to_string(), username, is_admin);
        user.tokens.push(StoredToken::from_raw("default", &raw_token));
        self.save(&user).await?;

        info!(user = %user.id, username, is_admin, "user created");
        Ok((user, raw_token))
    }

    /// Resolve a raw bearer token to its user.
    pub async fn authenticate(&self, raw_token: &str) -> ServiceResult<Option<User>> {
        let hash = hash_token(raw_token);
        if let Some(cached) = self.tokens.get(&hash).await {
            return Ok(cached);
        }

        let now = Utc::now();
        let user = self
            .list()
            .await?
            .into_iter()
            .find(|u| u.accepts_token(raw_token, now));

        self.tokens.insert(hash, user.clone()).await;
        Ok(user)
    }

    /// Make sure `raw_token` authenticates an admin, creating the bootstrap
    /// admin user if needed.
    pub async fn ensure_admin_token(&self, raw_token: &str) -> ServiceResult<User> {
        if let Some(user) = self.authenticate(raw_token).await? {
            if user.is_admin {
                return Ok(user);
            }
        }

        let mut user = match self.find_by_username(BOOTSTRAP_ADMIN).await? {
            Some(user) => user,
            None => User::new(uuid::Uuid::new_v4().simple().to_string(), BOOTSTRAP_ADMIN, true),
        };
        user.is_admin = true;
        user.tokens.push(StoredToken::from_raw("bootstrap", raw_token));
        self.save(&user).await?;

        info!(user = %user.id, "bootstrap admin token installed");
        Ok(user)
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("cached_tokens", &self.tokens.entry_count())
            .finish()
    }
}
