//! Content model.
//!
//! Content nodes are schema-typed documents arranged in a tree by `parent_id`
//! and ordered among siblings by `sort`. Field values live in `properties`;
//! a multilingual value is an object flagged with `_multilingual` that holds
//! one entry per language code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker key on objects that hold one value per language.
pub const MULTILINGUAL_FLAG: &str = "_multilingual";

/// Gap left between sibling sort indices when appending new content.
pub const SORT_INDEX_GAP: i64 = 10_000;

/// A Content node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub schema_id: String,

    #[serde(default)]
    pub sort: i64,

    #[serde(default)]
    pub is_published: bool,

    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,

    /// Last user to heartbeat an editor for this node (advisory only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_on: Option<DateTime<Utc>>,
}

impl Content {
    /// Create an empty content node of the given schema.
    pub fn new(id: impl Into<String>, schema_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            schema_id: schema_id.into(),
            sort: 0,
            is_published: false,
            properties: Map::new(),
            created_by: None,
            created_on: None,
            updated_by: None,
            updated_on: None,
            viewed_by: None,
            viewed_on: None,
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Display name: the `title` or `name` property for `language`, else the id.
    pub fn name(&self, language: &str) -> String {
        let props = self.localized_properties(language);
        ["title", "name"]
            .iter()
            .find_map(|key| props.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }

    /// Properties with every multilingual value resolved to `language`.
    ///
    /// Missing translations resolve to `null` so the property set keeps the
    /// same shape in every language.
    pub fn localized_properties(&self, language: &str) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(k, v)| (k.clone(), localize(v, language)))
            .collect()
    }

    /// The document published for one language: the id plus localized properties.
    pub fn localized_document(&self, language: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in self.localized_properties(language) {
            if key != "id" {
                doc.insert(key, value);
            }
        }
        Value::Object(doc)
    }

    /// Whether this node sits directly under `parent_id` (`None` is the root).
    pub fn is_child_of(&self, parent_id: Option<&str>) -> bool {
        self.parent_id.as_deref().filter(|p| !p.is_empty()) == parent_id.filter(|p| !p.is_empty())
    }
}

/// Whether a value is a per-language object.
pub fn is_multilingual(value: &Value) -> bool {
    value
        .get(MULTILINGUAL_FLAG)
        .is_some_and(|flag| flag.as_bool().unwrap_or(false))
}

/// Resolve multilingual objects within `value` to their `language` entry.
pub fn localize(value: &Value, language: &str) -> Value {
    match value {
        Value::Object(map) if is_multilingual(value) => map
            .get(language)
            .map(|v| localize(v, language))
            .unwrap_or(Value::Null),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), localize(v, language)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| localize(v, language)).collect()),
        other => other.clone(),
    }
}

/// Next sort index for a node appended after `siblings`.
pub fn next_sort_index<'a>(siblings: impl IntoIterator<Item = &'a Content>) -> i64 {
    siblings
        .into_iter()
        .map(|c| c.sort + SORT_INDEX_GAP)
        .max()
        .unwrap_or(SORT_INDEX_GAP)
        .max(SORT_INDEX_GAP)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn multilingual_page() -> Content {
        Content::new("page", "page")
            .with_property(
                "title",
                json!({ "_multilingual": true, "en": "Hello", "nl": "Hallo" }),
            )
            .with_property(
                "blocks",
                json!([{ "text": { "_multilingual": true, "en": "one", "nl": "een" } }]),
            )
            .with_property("slug", json!("hello"))
    }

    #[test]
    fn localizes_nested_values() {
        let props = multilingual_page().localized_properties("nl");
        assert_eq!(props["title"], json!("Hallo"));
        assert_eq!(props["blocks"], json!([{ "text": "een" }]));
        assert_eq!(props["slug"], json!("hello"));
    }

    #[test]
    fn missing_translation_is_null() {
        let props = multilingual_page().localized_properties("de");
        assert_eq!(props["title"], Value::Null);
    }

    #[test]
    fn document_leads_with_id() {
        let content = Content::new("abc", "page").with_property("title", json!("x"));
        let doc = content.localized_document("en");
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"id":"abc","title":"x"}"#);
    }

    #[test]
    fn name_falls_back_to_id() {
        assert_eq!(multilingual_page().name("en"), "Hello");
        assert_eq!(Content::new("bare", "page").name("en"), "bare");
    }

    #[test]
    fn serializes_camel_case() {
        let mut content = Content::new("a", "page");
        content.parent_id = Some("root".to_string());
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["parentId"], json!("root"));
        assert_eq!(value["schemaId"], json!("page"));
        assert!(value.get("viewedBy").is_none());
    }

    #[test]
    fn sort_index_leaves_room() {
        assert_eq!(next_sort_index(std::iter::empty()), SORT_INDEX_GAP);

        let mut a = Content::new("a", "page");
        a.sort = 25_000;
        let b = Content::new("b", "page");
        assert_eq!(next_sort_index([&a, &b]), 35_000);
    }

    #[test]
    fn empty_parent_counts_as_root() {
        let mut content = Content::new("a", "page");
        content.parent_id = Some(String::new());
        assert!(content.is_child_of(None));
        assert!(!content.is_child_of(Some("b")));
    }
}
