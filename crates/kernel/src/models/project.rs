//! Project model.
//!
//! A project owns its languages and a set of named environments. Each
//! environment carries its own media provider and sync settings.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::connection::path_component_check;

/// Language used when a project has none configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Environment every new project starts with.
pub const DEFAULT_ENVIRONMENT: &str = "live";

/// Project record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_environments")]
    pub environments: BTreeMap<String, EnvironmentSettings>,
}

/// Per-environment settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSettings {
    /// Id of the connection that stores this environment's media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_provider: Option<String>,

    #[serde(default)]
    pub sync: SyncSettings,
}

/// Remote HashBrown instance this environment pulls from and pushes to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Remote project id (defaults to the local one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Remote environment (defaults to the local one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

fn default_languages() -> Vec<String> {
    vec![DEFAULT_LANGUAGE.to_string()]
}

fn default_environments() -> BTreeMap<String, EnvironmentSettings> {
    BTreeMap::from([(DEFAULT_ENVIRONMENT.to_string(), EnvironmentSettings::default())])
}

impl Project {
    /// Create a project with the default language and environment.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            languages: default_languages(),
            environments: default_environments(),
        }
    }

    /// The first configured language.
    pub fn default_language(&self) -> &str {
        self.languages
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Settings for an environment, if the environment exists.
    pub fn environment(&self, name: &str) -> Option<&EnvironmentSettings> {
        self.environments.get(name)
    }

    /// Mutable settings for an environment, creating it if needed.
    pub fn environment_mut(&mut self, name: &str) -> &mut EnvironmentSettings {
        self.environments.entry(name.to_string()).or_default()
    }
}

/// Validate and normalize a language list.
///
/// Languages become deployer path segments, so each must pass the path
/// component check. Duplicates are dropped, order is kept.
pub fn normalize_languages(languages: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(languages.len());
    for language in languages {
        let language = language.trim();
        if language.is_empty() {
            bail!("language codes must not be empty");
        }
        path_component_check("language", language)?;
        if !normalized.iter().any(|l| l == language) {
            normalized.push(language.to_string());
        }
    }
    if normalized.is_empty() {
        bail!("a project needs at least one language");
    }
    Ok(normalized)
}
