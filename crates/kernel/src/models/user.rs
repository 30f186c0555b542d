//! User model and API token helpers.
//!
//! Users authenticate with API tokens. Only the SHA-256 hash of a token is
//! stored; the raw value is shown once when the token is issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// User record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub tokens: Vec<StoredToken>,
}

/// A hashed API token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub name: String,

    pub hash: String,

    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user without tokens.
    pub fn new(id: impl Into<String>, username: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_admin,
            tokens: Vec::new(),
        }
    }

    /// Whether `raw_token` matches one of this user's unexpired tokens.
    pub fn accepts_token(&self, raw_token: &str, now: DateTime<Utc>) -> bool {
        let hash = hash_token(raw_token);
        self.tokens
            .iter()
            .any(|t| t.hash == hash && t.expires.is_none_or(|expires| expires > now))
    }

    /// Public view of the user (token hashes stripped).
    pub fn redacted(&self) -> Self {
        Self {
            tokens: Vec::new(),
            ..self.clone()
        }
    }
}

impl StoredToken {
    /// Hash `raw_token` into a stored token record.
    pub fn from_raw(name: impl Into<String>, raw_token: &str) -> Self {
        Self {
            name: name.into(),
            hash: hash_token(raw_token),
            created: Utc::now(),
            expires: None,
        }
    }
}

/// Generate a random API token (64 hex characters).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
