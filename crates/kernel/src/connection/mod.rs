//! Connections and the publishing pipeline.
//!
//! A [`Connection`] pairs one [`Processor`] with one [`Deployer`], both picked
//! by alias through the [`StrategyRegistry`]. Publishing runs a content node
//! through the processor once per project language and writes each result
//! through the deployer at `content/<language>/<id><extension>`. Media is
//! written as raw bytes under `media/<id>/<name>`.
//!
//! Every user-supplied path fragment passes [`path_component_check`] before a
//! deployer sees it.
//!
//! Multi-language operations run sequentially and stop at the first failure.
//! Nothing is rolled back: the returned [`ConnectionError::Aborted`] lists the
//! languages already handled.

pub mod deployer;
mod error;
mod path;
pub mod processor;
mod registry;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::models::Content;
use crate::store::Scope;

pub use deployer::{Deployer, DeployerOptions, PathKind, decode_payload, encode_payload};
pub use error::{ConnectionError, DeployerError};
pub use path::{basename, join_path, parent_name, path_component_check};
pub use processor::{Processed, Processor};
pub use registry::{DeployerContext, DeployerFactory, ProcessorFactory, StrategyRegistry};

/// Media files with this name are thumbnails, never the canonical file.
pub const THUMBNAIL_NAME: &str = "thumbnail.jpg";

/// `join_path` collapses the `//` after a URL scheme; this finds the damage.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static COLLAPSED_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":/([^/])").expect("valid regex literal"));

/// Alias plus free-form options for one strategy.
///
/// Stored flattened, e.g. `{"alias": "filesystem", "path": "site"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default)]
    pub alias: String,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StrategySettings {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            options: Map::new(),
        }
    }

    /// Settings whose options are the serialized fields of `options`.
    pub fn with_options(alias: impl Into<String>, options: &impl Serialize) -> Self {
        let mut settings = Self::new(alias);
        match serde_json::to_value(options) {
            Ok(Value::Object(map)) => settings.options = map,
            Ok(_) => {}
            Err(e) => warn!(alias = %settings.alias, error = %e, "strategy options failed to serialize"),
        }
        settings
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.options.insert(key.into(), value);
    }

    /// Whether an alias is set at all.
    pub fn is_empty(&self) -> bool {
        self.alias.trim().is_empty()
    }

    /// Deserialize the options into a typed settings struct.
    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(Value::Object(self.options.clone()))?)
    }
}

/// Stored form of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Public base URL of the deployed site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub processor: StrategySettings,

    #[serde(default)]
    pub deployer: StrategySettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_on: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            processor: StrategySettings::default(),
            deployer: StrategySettings::default(),
            created_by: None,
            created_on: None,
            updated_by: None,
            updated_on: None,
            viewed_by: None,
            viewed_on: None,
        }
    }
}

/// Answers which languages a project publishes in.
#[async_trait]
pub trait LanguageSource: Send + Sync {
    /// Languages of `project`, or `None` when the project does not exist.
    async fn languages(&self, project: &str) -> anyhow::Result<Option<Vec<String>>>;
}

/// A connection with live strategy instances.
#[derive(Debug, Clone)]
pub struct Connection {
    record: ConnectionRecord,
    scope: Scope,
    processor: Option<Arc<dyn Processor>>,
    deployer: Option<Arc<dyn Deployer>>,
}

impl Connection {
    /// Instantiate the record's strategies through the registry.
    ///
    /// An empty or unknown alias leaves that strategy unset; operations that
    /// need it then fail with a configuration error.
    pub fn adopt(record: ConnectionRecord, scope: Scope, registry: &StrategyRegistry) -> Self {
        let processor = if record.processor.is_empty() {
            None
        } else {
            registry
                .processor(&record.processor)
                .inspect_err(|e| {
                    warn!(connection = %record.id, error = %e, "processor unavailable");
                })
                .ok()
        };

        let deployer = if record.deployer.is_empty() {
            None
        } else {
            registry
                .deployer(&record.deployer)
                .inspect_err(|e| {
                    warn!(connection = %record.id, error = %e, "deployer unavailable");
                })
                .ok()
        };

        Self::with_strategies(record, scope, processor, deployer)
    }

    /// Build from already-instantiated strategies.
    pub fn with_strategies(
        record: ConnectionRecord,
        scope: Scope,
        processor: Option<Arc<dyn Processor>>,
        deployer: Option<Arc<dyn Deployer>>,
    ) -> Self {
        Self {
            record,
            scope,
            processor,
            deployer,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn record(&self) -> &ConnectionRecord {
        &self.record
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn deployer(&self) -> Option<&Arc<dyn Deployer>> {
        self.deployer.as_ref()
    }

    /// Stored form, with strategy settings taken from the live instances.
    pub fn to_record(&self) -> ConnectionRecord {
        let mut record = self.record.clone();
        if let Some(processor) = &self.processor {
            record.processor = processor.settings();
        }
        if let Some(deployer) = &self.deployer {
            record.deployer = deployer.settings();
        }
        record
    }

    fn require_processor(&self) -> Result<&dyn Processor, ConnectionError> {
        self.processor
            .as_deref()
            .ok_or(ConnectionError::MissingProcessor)
    }

    fn require_deployer(&self) -> Result<&dyn Deployer, ConnectionError> {
        self.deployer
            .as_deref()
            .ok_or(ConnectionError::MissingDeployer)
    }

    fn content_path(
        deployer: &dyn Deployer,
        id: &str,
        language: &str,
    ) -> Result<String, ConnectionError> {
        require_component("id", id)?;
        require_component("language", language)?;
        path_component_check("fileExtension", deployer.file_extension())?;

        let file = format!("{language}/{id}{}", deployer.file_extension());
        Ok(deployer.get_path(PathKind::Content, Some(&file)))
    }

    /// Publish `content` for one language under `id`.
    pub async fn set_content(
        &self,
        id: &str,
        content: &Content,
        language: &str,
    ) -> Result<(), ConnectionError> {
        let processor = self.require_processor()?;
        let deployer = self.require_deployer()?;
        let path = Self::content_path(deployer, id, language)?;

        let processed = processor
            .process(content, language)
            .await
            .map_err(|source| ConnectionError::Processor {
                alias: processor.alias().to_string(),
                source,
            })?;
        let payload = encode_payload(processed.into_text());

        deployer.set_file(&path, &payload).await?;
        debug!(connection = %self.record.id, id, language, path = %path, "content written");
        Ok(())
    }

    /// Remove the published file of `id` for one language.
    pub async fn remove_content(&self, id: &str, language: &str) -> Result<(), ConnectionError> {
        let deployer = self.require_deployer()?;
        let path = Self::content_path(deployer, id, language)?;

        deployer.remove_file(&path).await?;
        debug!(connection = %self.record.id, id, language, path = %path, "content removed");
        Ok(())
    }

    async fn project_languages(
        &self,
        source: &dyn LanguageSource,
    ) -> Result<Vec<String>, ConnectionError> {
        source
            .languages(&self.scope.project)
            .await
            .map_err(ConnectionError::LanguageLookup)?
            .ok_or_else(|| ConnectionError::ProjectNotFound(self.scope.project.clone()))
    }

    /// Publish every language of `content`. Returns the languages written.
    pub async fn publish_content(
        &self,
        content: &Content,
        source: &dyn LanguageSource,
    ) -> Result<Vec<String>, ConnectionError> {
        info!(connection = %self.record.id, content = %content.id, "publishing all localisations");

        let languages = self.project_languages(source).await?;
        let mut completed = Vec::with_capacity(languages.len());

        for language in languages {
            if let Err(e) = self.set_content(&content.id, content, &language).await {
                error!(
                    connection = %self.record.id,
                    content = %content.id,
                    language = %language,
                    completed = ?completed,
                    error = %e,
                    "publish stopped"
                );
                return Err(ConnectionError::Aborted {
                    operation: "publish",
                    language,
                    completed,
                    source: Box::new(e),
                });
            }
            completed.push(language);
        }

        info!(connection = %self.record.id, content = %content.id, languages = ?completed, "published");
        Ok(completed)
    }

    /// Remove every language of `content`. Returns the languages removed.
    pub async fn unpublish_content(
        &self,
        content: &Content,
        source: &dyn LanguageSource,
    ) -> Result<Vec<String>, ConnectionError> {
        info!(connection = %self.record.id, content = %content.id, "unpublishing all localisations");

        let languages = self.project_languages(source).await?;
        let mut completed = Vec::with_capacity(languages.len());

        for language in languages {
            if let Err(e) = self.remove_content(&content.id, &language).await {
                error!(
                    connection = %self.record.id,
                    content = %content.id,
                    language = %language,
                    completed = ?completed,
                    error = %e,
                    "unpublish stopped"
                );
                return Err(ConnectionError::Aborted {
                    operation: "unpublish",
                    language,
                    completed,
                    source: Box::new(e),
                });
            }
            completed.push(language);
        }

        info!(connection = %self.record.id, content = %content.id, languages = ?completed, "unpublished");
        Ok(completed)
    }

    /// First non-thumbnail file of every media folder, keyed by media id.
    pub async fn get_all_media_urls(&self) -> Result<BTreeMap<String, String>, ConnectionError> {
        let deployer = self.require_deployer()?;
        let files = deployer
            .get_folder(&deployer.get_path(PathKind::Media, None), 2)
            .await?;

        let mut urls = BTreeMap::new();
        for file in files {
            if basename(&file) == THUMBNAIL_NAME {
                continue;
            }
            urls.entry(parent_name(&file).to_string()).or_insert(file);
        }
        Ok(urls)
    }

    /// First non-thumbnail file of one media folder.
    ///
    /// With `ensure_web_url`, a path without a scheme is rebuilt under the
    /// connection's public URL.
    pub async fn get_media_url(
        &self,
        id: &str,
        ensure_web_url: bool,
    ) -> Result<Option<String>, ConnectionError> {
        let deployer = self.require_deployer()?;
        require_component("id", id)?;

        let folder = deployer.get_path(PathKind::Media, Some(&format!("{id}/")));
        let files = deployer.get_folder(&folder, 1).await?;

        let Some(file) = files.into_iter().find(|f| basename(f) != THUMBNAIL_NAME) else {
            return Ok(None);
        };

        if ensure_web_url && !file.contains("://") {
            let joined = join_path(&[
                self.record.url.as_deref().unwrap_or(""),
                &deployer.options().paths.media,
                id,
                basename(&file),
            ]);
            return Ok(Some(COLLAPSED_SCHEME.replace(&joined, "://$1").into_owned()));
        }

        Ok(Some(file))
    }

    /// Write a media file. With `clear`, the media folder is emptied first.
    pub async fn set_media(
        &self,
        id: &str,
        name: &str,
        base64: &str,
        clear: bool,
    ) -> Result<(), ConnectionError> {
        require_component("id", id)?;
        require_component("name", name)?;

        if clear {
            match self.remove_media(id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(connection = %self.record.id, media = %id, "nothing to clear");
                }
                Err(e) => return Err(e),
            }
        }

        let deployer = self.require_deployer()?;
        let path = deployer.get_path(PathKind::Media, Some(&format!("{id}/{name}")));
        deployer.set_file(&path, base64).await?;
        debug!(connection = %self.record.id, media = %id, path = %path, "media written");
        Ok(())
    }

    /// Remove a media folder and everything in it.
    pub async fn remove_media(&self, id: &str) -> Result<(), ConnectionError> {
        require_component("id", id)?;
        let deployer = self.require_deployer()?;

        deployer
            .remove_folder(&deployer.get_path(PathKind::Media, Some(id)))
            .await?;
        debug!(connection = %self.record.id, media = %id, "media removed");
        Ok(())
    }
}

/// Path check for values that must also be present.
fn require_component(name: &str, value: &str) -> Result<(), ConnectionError> {
    if value.is_empty() {
        return Err(ConnectionError::IllegalPathComponent {
            name: name.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    path_component_check(name, value)
}
