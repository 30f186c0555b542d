//! Deployer backends.
//!
//! A deployer writes published payloads to a destination. Paths handed to a
//! deployer always come from its own [`Deployer::get_path`], and payloads
//! arrive base64-encoded.

mod filesystem;
mod memory;
#[cfg(feature = "s3")]
mod s3;

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{DeployerError, StrategySettings, join_path};

pub use filesystem::FileSystemDeployer;
pub use memory::{MemoryDeployer, MemoryVolumes};
#[cfg(feature = "s3")]
pub use s3::S3Deployer;

/// Extension appended to published content files unless configured otherwise.
pub const DEFAULT_FILE_EXTENSION: &str = ".json";

/// Which top-level folder a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Content,
    Media,
}

/// Folder prefixes for content and media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployerPaths {
    #[serde(default = "default_content_path")]
    pub content: String,
    #[serde(default = "default_media_path")]
    pub media: String,
}

fn default_content_path() -> String {
    "content".to_string()
}

fn default_media_path() -> String {
    "media".to_string()
}

fn default_file_extension() -> String {
    DEFAULT_FILE_EXTENSION.to_string()
}

impl Default for DeployerPaths {
    fn default() -> Self {
        Self {
            content: default_content_path(),
            media: default_media_path(),
        }
    }
}

impl DeployerPaths {
    pub fn prefix(&self, kind: PathKind) -> &str {
        match kind {
            PathKind::Content => &self.content,
            PathKind::Media => &self.media,
        }
    }
}

/// Settings shared by every deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerOptions {
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    #[serde(default)]
    pub paths: DeployerPaths,
}

impl Default for DeployerOptions {
    fn default() -> Self {
        Self {
            file_extension: default_file_extension(),
            paths: DeployerPaths::default(),
        }
    }
}

/// Deployer backend.
#[async_trait]
pub trait Deployer: Send + Sync + fmt::Debug {
    /// Registry alias of this deployer.
    fn alias(&self) -> &str;

    /// Common options (file extension, folder prefixes).
    fn options(&self) -> &DeployerOptions;

    /// Root every path is joined under.
    fn root(&self) -> &str;

    /// Extension appended to content files.
    fn file_extension(&self) -> &str {
        &self.options().file_extension
    }

    /// Build a path under the folder for `kind`.
    fn get_path(&self, kind: PathKind, sub_path: Option<&str>) -> String {
        join_path(&[
            self.root(),
            self.options().paths.prefix(kind),
            sub_path.unwrap_or(""),
        ])
    }

    /// Write a base64-encoded payload to `path`, replacing any existing file.
    async fn set_file(&self, path: &str, base64: &str) -> Result<(), DeployerError>;

    /// Remove one file. Missing files are reported as [`DeployerError::NotFound`].
    async fn remove_file(&self, path: &str) -> Result<(), DeployerError>;

    /// Remove a folder and everything below it. Missing folders are reported
    /// as [`DeployerError::NotFound`].
    async fn remove_folder(&self, path: &str) -> Result<(), DeployerError>;

    /// List files below `path`, descending at most `depth` levels
    /// (`1` lists only direct children). A missing folder lists as empty.
    async fn get_folder(&self, path: &str, depth: usize) -> Result<Vec<String>, DeployerError>;

    /// Settings that recreate this deployer through the registry.
    fn settings(&self) -> StrategySettings;
}

/// Decode a base64 payload.
pub fn decode_payload(base64: &str) -> Result<Vec<u8>, DeployerError> {
    Ok(STANDARD.decode(base64.trim())?)
}

/// Encode bytes as a base64 payload.
pub fn encode_payload(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}
