//! In-memory deployer.
//!
//! Files live in named volumes shared through [`MemoryVolumes`], so every
//! connection instance configured with the same volume sees the same files.
//! Useful for previews and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use super::{Deployer, DeployerError, DeployerOptions, decode_payload};
use crate::connection::{StrategySettings, join_path};

/// Volume used when the settings do not name one.
pub const DEFAULT_VOLUME: &str = "default";

type Volume = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// Registry of named in-memory volumes.
#[derive(Clone, Default)]
pub struct MemoryVolumes {
    volumes: Arc<DashMap<String, Volume>>,
}

impl MemoryVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    fn volume(&self, name: &str) -> Volume {
        self.volumes
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new())))
            .clone()
    }

    /// Read one file from a volume.
    pub fn read(&self, volume: &str, path: &str) -> Option<Vec<u8>> {
        self.volumes
            .get(volume)
            .and_then(|v| v.read().get(path).cloned())
    }

    /// All file paths in a volume.
    pub fn paths(&self, volume: &str) -> Vec<String> {
        self.volumes
            .get(volume)
            .map(|v| v.read().keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryVolumes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVolumes")
            .field("volumes", &self.volumes.len())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MemorySettings {
    #[serde(default)]
    volume: Option<String>,
    #[serde(flatten)]
    common: DeployerOptions,
}

/// Deployer that keeps files in memory.
pub struct MemoryDeployer {
    volume_name: String,
    files: Volume,
    options: DeployerOptions,
}

impl MemoryDeployer {
    /// A deployer over its own private volume.
    pub fn new(options: DeployerOptions) -> Self {
        Self {
            volume_name: DEFAULT_VOLUME.to_string(),
            files: Arc::new(RwLock::new(BTreeMap::new())),
            options,
        }
    }

    /// Build from registry settings, attaching to a shared volume.
    pub fn from_settings(
        settings: &StrategySettings,
        volumes: &MemoryVolumes,
    ) -> anyhow::Result<Self> {
        let parsed: MemorySettings = settings.parse()?;
        let volume_name = parsed.volume.unwrap_or_else(|| DEFAULT_VOLUME.to_string());
        Ok(Self {
            files: volumes.volume(&volume_name),
            volume_name,
            options: parsed.common,
        })
    }

    /// Read a file's bytes.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(path).cloned()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Deployer for MemoryDeployer {
    fn alias(&self) -> &str {
        "memory"
    }

    fn options(&self) -> &DeployerOptions {
        &self.options
    }

    fn root(&self) -> &str {
        ""
    }

    async fn set_file(&self, path: &str, base64: &str) -> Result<(), DeployerError> {
        let data = decode_payload(base64)?;
        let size = data.len();
        self.files.write().insert(join_path(&[path]), data);
        debug!(volume = %self.volume_name, path = %path, size, "file written");
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), DeployerError> {
        match self.files.write().remove(&join_path(&[path])) {
            Some(_) => {
                debug!(volume = %self.volume_name, path = %path, "file removed");
                Ok(())
            }
            None => Err(DeployerError::NotFound(path.to_string())),
        }
    }

    async fn remove_folder(&self, path: &str) -> Result<(), DeployerError> {
        let prefix = format!("{}/", join_path(&[path]));
        let mut files = self.files.write();
        let before = files.len();
        files.retain(|key, _| !key.starts_with(&prefix));
        if files.len() == before {
            return Err(DeployerError::NotFound(path.to_string()));
        }
        debug!(volume = %self.volume_name, path = %path, removed = before - files.len(), "folder removed");
        Ok(())
    }

    async fn get_folder(&self, path: &str, depth: usize) -> Result<Vec<String>, DeployerError> {
        let base = join_path(&[path]);
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{base}/")
        };

        Ok(self
            .files
            .read()
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?;
                (rest.split('/').count() <= depth).then(|| key.clone())
            })
            .collect())
    }

    fn settings(&self) -> StrategySettings {
        let mut settings = StrategySettings::with_options(self.alias(), &self.options);
        if self.volume_name != DEFAULT_VOLUME {
            settings.set("volume", serde_json::Value::String(self.volume_name.clone()));
        }
        settings
    }
}

impl std::fmt::Debug for MemoryDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDeployer")
            .field("volume", &self.volume_name)
            .field("files", &self.files.read().len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::connection::deployer::{PathKind, encode_payload};
    use serde_json::json;

    #[tokio::test]
    async fn set_then_remove_leaves_nothing() {
        let deployer = MemoryDeployer::new(DeployerOptions::default());
        let path = deployer.get_path(PathKind::Content, Some("en/abc.json"));
        assert_eq!(path, "content/en/abc.json");

        deployer.set_file(&path, &encode_payload("x")).await.unwrap();
        assert_eq!(deployer.read(&path).unwrap(), b"x");

        deployer.remove_file(&path).await.unwrap();
        assert!(deployer.paths().is_empty());
        assert!(deployer.remove_file(&path).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn folder_listing_respects_depth() {
        let deployer = MemoryDeployer::new(DeployerOptions::default());
        for path in ["media/a/x.jpg", "media/a/deep/y.jpg", "media/b/z.jpg", "content/en/c.json"] {
            deployer.set_file(path, &encode_payload("1")).await.unwrap();
        }

        assert_eq!(
            deployer.get_folder("media", 2).await.unwrap(),
            vec!["media/a/x.jpg", "media/b/z.jpg"]
        );
        assert_eq!(
            deployer.get_folder("media/a/", 1).await.unwrap(),
            vec!["media/a/x.jpg"]
        );
        assert!(deployer.get_folder("media/none", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_folder_drops_prefix_only() {
        let deployer = MemoryDeployer::new(DeployerOptions::default());
        for path in ["media/a/x.jpg", "media/ab/y.jpg"] {
            deployer.set_file(path, &encode_payload("1")).await.unwrap();
        }

        deployer.remove_folder("media/a").await.unwrap();
        assert_eq!(deployer.paths(), vec!["media/ab/y.jpg"]);
        assert!(deployer.remove_folder("media/a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn shared_volumes_are_visible_across_instances() {
        let volumes = MemoryVolumes::new();
        let settings: StrategySettings =
            serde_json::from_value(json!({ "alias": "memory", "volume": "site" })).unwrap();

        let a = MemoryDeployer::from_settings(&settings, &volumes).unwrap();
        let b = MemoryDeployer::from_settings(&settings, &volumes).unwrap();
        a.set_file("content/en/x.json", &encode_payload("{}")).await.unwrap();

        assert_eq!(b.read("content/en/x.json").unwrap(), b"{}");
        assert_eq!(volumes.paths("site"), vec!["content/en/x.json"]);
        assert_eq!(b.settings().options["volume"], json!("site"));
    }
}
