//! Content processors.
//!
//! A processor turns one Content node in one language into the payload a
//! deployer writes. Processors are stateless.

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::StrategySettings;
use crate::models::Content;

/// Output of a processor run.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    /// Already-serialized text, written as is.
    Text(String),
    /// A structured value, serialized to JSON before writing.
    Value(Value),
}

impl Processed {
    /// Coerce to the UTF-8 text that gets deployed.
    ///
    /// Structured values are JSON-stringified. A `serde_json::Value` always
    /// serializes, so there is no failure case to fall back from.
    pub fn into_text(self) -> String {
        match self {
            Processed::Text(text) => text,
            Processed::Value(value) => value.to_string(),
        }
    }
}

/// Content processor.
#[async_trait]
pub trait Processor: Send + Sync + fmt::Debug {
    /// Registry alias of this processor.
    fn alias(&self) -> &str;

    /// Transform `content` for `language`.
    async fn process(&self, content: &Content, language: &str) -> Result<Processed>;

    /// Settings that recreate this processor through the registry.
    fn settings(&self) -> StrategySettings {
        StrategySettings::new(self.alias())
    }
}

/// Publishes the localized document as a JSON value.
#[derive(Debug, Clone, Default)]
pub struct JsonProcessor;

#[async_trait]
impl Processor for JsonProcessor {
    fn alias(&self) -> &str {
        "json"
    }

    async fn process(&self, content: &Content, language: &str) -> Result<Processed> {
        Ok(Processed::Value(content.localized_document(language)))
    }
}

/// Publishes the localized document as YAML text.
#[derive(Debug, Clone, Default)]
pub struct YamlProcessor;

#[async_trait]
impl Processor for YamlProcessor {
    fn alias(&self) -> &str {
        "yaml"
    }

    async fn process(&self, content: &Content, language: &str) -> Result<Processed> {
        let doc = content.localized_document(language);
        let text = serde_yml::to_string(&doc)
            .with_context(|| format!("failed to render content \"{}\" as YAML", content.id))?;
        Ok(Processed::Text(text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Content {
        Content::new("abc", "page")
            .with_property("title", json!({ "_multilingual": true, "en": "x", "nl": "y" }))
    }

    #[tokio::test]
    async fn json_processor_localizes() {
        let out = JsonProcessor.process(&page(), "nl").await.unwrap();
        assert_eq!(out, Processed::Value(json!({ "id": "abc", "title": "y" })));
    }

    #[tokio::test]
    async fn yaml_processor_emits_text() {
        let out = YamlProcessor.process(&page(), "en").await.unwrap();
        let Processed::Text(text) = out else {
            panic!("expected text output");
        };
        assert!(text.contains("id: abc"));
        assert!(text.contains("title: x"));
    }

    #[test]
    fn text_passes_through() {
        assert_eq!(Processed::Text("<p>hi</p>".into()).into_text(), "<p>hi</p>");
    }

    #[test]
    fn values_are_json_stringified() {
        let text = Processed::Value(json!({ "id": "abc", "title": "x" })).into_text();
        assert_eq!(text, r#"{"id":"abc","title":"x"}"#);
        assert_eq!(Processed::Value(json!(42)).into_text(), "42");
        assert_eq!(Processed::Value(json!("quoted")).into_text(), r#""quoted""#);
    }

    #[test]
    fn settings_carry_alias() {
        assert_eq!(JsonProcessor.settings().alias, "json");
        assert_eq!(YamlProcessor.settings().alias, "yaml");
    }
}
