//! Local filesystem deployer.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Deployer, DeployerError, DeployerOptions, decode_payload};
use crate::connection::{StrategySettings, join_path};

/// Settings accepted by the `filesystem` alias.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileSystemSettings {
    /// Target directory. Relative paths resolve against the storage dir.
    #[serde(default)]
    path: Option<String>,
    #[serde(flatten)]
    common: DeployerOptions,
}

/// Writes published files below a local directory.
pub struct FileSystemDeployer {
    root: PathBuf,
    root_str: String,
    /// Path as configured, kept for round-tripping settings.
    configured_path: Option<String>,
    options: DeployerOptions,
}

impl FileSystemDeployer {
    /// Create a deployer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, options: DeployerOptions) -> Self {
        let root = root.into();
        let root_str = root.to_string_lossy().into_owned();
        Self {
            root,
            root_str,
            configured_path: None,
            options,
        }
    }

    /// Build from registry settings.
    pub fn from_settings(settings: &StrategySettings, storage_dir: &Path) -> anyhow::Result<Self> {
        let parsed: FileSystemSettings = settings.parse()?;
        let root = match parsed.path.as_deref() {
            Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
            Some(p) => storage_dir.join(p),
            None => storage_dir.join("deploy"),
        };
        if root
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            anyhow::bail!("filesystem deployer path must not contain \"..\"");
        }

        let mut deployer = Self::new(root, parsed.common);
        deployer.configured_path = parsed.path;
        Ok(deployer)
    }

    /// Map a deployer path to a location below the root.
    ///
    /// Rejects paths containing `..` components or pointing outside the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, DeployerError> {
        let candidate = PathBuf::from(path);
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(DeployerError::OutsideRoot(path.to_string()));
        }
        if !candidate.starts_with(&self.root) {
            return Err(DeployerError::OutsideRoot(path.to_string()));
        }
        Ok(candidate)
    }
}

#[async_trait]
impl Deployer for FileSystemDeployer {
    fn alias(&self) -> &str {
        "filesystem"
    }

    fn options(&self) -> &DeployerOptions {
        &self.options
    }

    fn root(&self) -> &str {
        &self.root_str
    }

    async fn set_file(&self, path: &str, base64: &str) -> Result<(), DeployerError> {
        let target = self.resolve(path)?;
        let data = decode_payload(base64)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DeployerError::io(parent.to_string_lossy(), e))?;
        }

        let mut file = fs::File::create(&target)
            .await
            .map_err(|e| DeployerError::io(path, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| DeployerError::io(path, e))?;
        file.flush().await.map_err(|e| DeployerError::io(path, e))?;

        debug!(path = %path, size = data.len(), "file written");
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), DeployerError> {
        let target = self.resolve(path)?;
        fs::remove_file(&target)
            .await
            .map_err(|e| DeployerError::io(path, e))?;
        debug!(path = %path, "file removed");
        Ok(())
    }

    async fn remove_folder(&self, path: &str) -> Result<(), DeployerError> {
        let target = self.resolve(path)?;
        fs::remove_dir_all(&target)
            .await
            .map_err(|e| DeployerError::io(path, e))?;
        debug!(path = %path, "folder removed");
        Ok(())
    }

    async fn get_folder(&self, path: &str, depth: usize) -> Result<Vec<String>, DeployerError> {
        let base = join_path(&[path]);
        let base_path = self.resolve(&base)?;
        if !fs::try_exists(&base_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![(base, 1usize)];

        while let Some((dir, level)) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| DeployerError::io(dir.as_str(), e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DeployerError::io(dir.as_str(), e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = format!("{dir}/{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| DeployerError::io(child.as_str(), e))?;

                if file_type.is_dir() {
                    if level < depth {
                        pending.push((child, level + 1));
                    }
                } else {
                    files.push(child);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn settings(&self) -> StrategySettings {
        let mut settings = StrategySettings::with_options(self.alias(), &self.options);
        if let Some(path) = &self.configured_path {
            settings.set("path", serde_json::Value::String(path.clone()));
        }
        settings
    }
}

impl std::fmt::Debug for FileSystemDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemDeployer")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::connection::deployer::{PathKind, encode_payload};
    use serde_json::json;

    fn deployer(dir: &Path) -> FileSystemDeployer {
        FileSystemDeployer::new(dir, DeployerOptions::default())
    }

    #[tokio::test]
    async fn writes_decoded_payload() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = deployer(dir.path());
        let path = deployer.get_path(PathKind::Content, Some("en/abc.json"));

        deployer
            .set_file(&path, &encode_payload(r#"{"id":"abc"}"#))
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("content/en/abc.json")).unwrap();
        assert_eq!(written, r#"{"id":"abc"}"#);
    }

    #[tokio::test]
    async fn remove_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = deployer(dir.path());
        let path = deployer.get_path(PathKind::Content, Some("en/missing.json"));

        let err = deployer.remove_file(&path).await.unwrap_err();
        assert!(err.is_not_found());

        let folder = deployer.get_path(PathKind::Media, Some("nope"));
        assert!(deployer.remove_folder(&folder).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = deployer(dir.path());

        let outside = format!("{}/../escape.txt", dir.path().display());
        assert!(matches!(
            deployer.set_file(&outside, &encode_payload("x")).await,
            Err(DeployerError::OutsideRoot(_))
        ));
        assert!(matches!(
            deployer.set_file("/etc/passwd", &encode_payload("x")).await,
            Err(DeployerError::OutsideRoot(_))
        ));
    }

    #[tokio::test]
    async fn lists_folders_to_depth() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = deployer(dir.path());
        for sub in ["b/photo.png", "a/thumbnail.jpg", "a/photo.jpg", "a/deep/x.jpg"] {
            let path = deployer.get_path(PathKind::Media, Some(sub));
            deployer.set_file(&path, &encode_payload("x")).await.unwrap();
        }

        let media = deployer.get_path(PathKind::Media, None);
        let root = deployer.root().to_string();
        let listed: Vec<String> = deployer
            .get_folder(&media, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.trim_start_matches(&root).to_string())
            .collect();
        assert_eq!(
            listed,
            vec![
                "/media/a/photo.jpg",
                "/media/a/thumbnail.jpg",
                "/media/b/photo.png"
            ]
        );

        let one = deployer.get_path(PathKind::Media, Some("a/"));
        assert_eq!(deployer.get_folder(&one, 1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_folder_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let deployer = deployer(dir.path());
        let media = deployer.get_path(PathKind::Media, None);
        assert!(deployer.get_folder(&media, 2).await.unwrap().is_empty());
    }

    #[test]
    fn settings_resolve_relative_paths() {
        let settings: StrategySettings = serde_json::from_value(json!({
            "alias": "filesystem",
            "path": "site",
            "fileExtension": ".html"
        }))
        .unwrap();
        let deployer = FileSystemDeployer::from_settings(&settings, Path::new("/srv/storage")).unwrap();
        assert_eq!(deployer.root(), "/srv/storage/site");
        assert_eq!(deployer.file_extension(), ".html");

        let round_trip = deployer.settings();
        assert_eq!(round_trip.alias, "filesystem");
        assert_eq!(round_trip.options["path"], json!("site"));
    }

    #[test]
    fn settings_reject_parent_dirs() {
        let settings: StrategySettings =
            serde_json::from_value(json!({ "alias": "filesystem", "path": "../up" })).unwrap();
        assert!(FileSystemDeployer::from_settings(&settings, Path::new("/srv")).is_err());
    }
}
