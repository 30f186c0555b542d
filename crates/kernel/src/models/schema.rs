//! Schema model.
//!
//! Schemas describe the fields of a content type. A schema may extend a
//! parent schema, inheriting its fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::content::{MULTILINGUAL_FLAG, is_multilingual};

/// Icon used when a schema does not declare one.
pub const DEFAULT_ICON: &str = "file";

/// Schema record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_schema_id: Option<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_on: Option<DateTime<Utc>>,
}

/// A single field in a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub multilingual: bool,

    /// Editor-specific settings, carried through untouched.
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl Schema {
    /// Create a schema with no fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            parent_schema_id: None,
            fields: BTreeMap::new(),
            viewed_by: None,
            viewed_on: None,
        }
    }

    /// The declared icon, or the default.
    pub fn icon_or_default(&self) -> &str {
        self.icon.as_deref().unwrap_or(DEFAULT_ICON)
    }
}

impl FieldDefinition {
    /// Coerce a stored value to match this definition's multilingual setting.
    ///
    /// A bare value on a multilingual field is wrapped under `language`; a
    /// multilingual object on a plain field collapses to its `language` entry.
    pub fn sanitize(&self, value: Value, language: &str) -> Value {
        match (self.multilingual, value) {
            (true, Value::Object(mut map)) => {
                map.insert(MULTILINGUAL_FLAG.to_string(), Value::Bool(true));
                Value::Object(map)
            }
            (true, Value::Null) => Value::Null,
            (true, bare) => {
                let mut map = Map::new();
                map.insert(MULTILINGUAL_FLAG.to_string(), Value::Bool(true));
                map.insert(language.to_string(), bare);
                Value::Object(map)
            }
            (false, value) if is_multilingual(&value) => {
                value.get(language).cloned().unwrap_or(Value::Null)
            }
            (false, value) => value,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(multilingual: bool) -> FieldDefinition {
        FieldDefinition {
            multilingual,
            ..Default::default()
        }
    }

    #[test]
    fn wraps_bare_value_for_multilingual_field() {
        let value = field(true).sanitize(json!("Hello"), "en");
        assert_eq!(value, json!({ "_multilingual": true, "en": "Hello" }));
    }

    #[test]
    fn flags_existing_language_map() {
        let value = field(true).sanitize(json!({ "en": "Hello", "nl": "Hallo" }), "en");
        assert_eq!(
            value,
            json!({ "_multilingual": true, "en": "Hello", "nl": "Hallo" })
        );
    }

    #[test]
    fn collapses_multilingual_value_on_plain_field() {
        let value = field(false).sanitize(json!({ "_multilingual": true, "en": "Hi" }), "en");
        assert_eq!(value, json!("Hi"));
    }

    #[test]
    fn leaves_plain_values_alone() {
        let value = field(false).sanitize(json!({ "a": 1 }), "en");
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn keeps_editor_config() {
        let def: FieldDefinition =
            serde_json::from_value(json!({ "multilingual": true, "editor": "rich-text" })).unwrap();
        assert!(def.multilingual);
        assert_eq!(def.config["editor"], json!("rich-text"));
    }
}
