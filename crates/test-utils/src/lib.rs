//! HashBrown test utilities.
//!
//! JSON fixture builders for content, schemas, and connections, plus
//! assertion helpers for API responses.

use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

/// Create a test content node of the given schema.
pub fn test_content(schema_id: &str) -> TestContent {
    TestContent {
        id: Uuid::new_v4().simple().to_string(),
        schema_id: schema_id.to_string(),
        parent_id: None,
        properties: Map::new(),
    }
}

/// A content node builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestContent {
    pub id: String,
    pub schema_id: String,
    pub parent_id: Option<String>,
    pub properties: Map<String, JsonValue>,
}

impl TestContent {
    /// Set a custom ID.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Place the node under a parent.
    pub fn under(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    /// Add a plain property.
    pub fn with_property(mut self, name: &str, value: JsonValue) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    /// Add a multilingual property from `(language, value)` pairs.
    pub fn with_translations(self, name: &str, values: &[(&str, &str)]) -> Self {
        let mut localized = Map::new();
        localized.insert("_multilingual".to_string(), JsonValue::Bool(true));
        for (language, value) in values {
            localized.insert((*language).to_string(), json!(value));
        }
        self.with_property(name, JsonValue::Object(localized))
    }

    /// The node as the API expects it.
    pub fn to_json(&self) -> JsonValue {
        let mut doc = json!({
            "id": self.id,
            "schemaId": self.schema_id,
            "properties": self.properties,
        });
        if let (Some(parent), Some(obj)) = (&self.parent_id, doc.as_object_mut()) {
            obj.insert("parentId".to_string(), json!(parent));
        }
        doc
    }
}

/// Schema builders for testing.
pub mod schemas {
    use serde_json::json;

    /// A page schema: multilingual `title`, plain `slug`.
    pub fn page_schema() -> serde_json::Value {
        json!({
            "id": "page",
            "name": "Page",
            "icon": "file-text",
            "fields": {
                "title": { "multilingual": true },
                "slug": { "multilingual": false }
            }
        })
    }

    /// An article schema extending `page` with a multilingual `body`.
    pub fn article_schema() -> serde_json::Value {
        json!({
            "id": "article",
            "name": "Article",
            "parentSchemaId": "page",
            "fields": {
                "body": { "multilingual": true }
            }
        })
    }
}

/// Connection builders for testing.
pub mod connections {
    use serde_json::json;

    /// A connection rendering JSON into a named in-memory volume.
    pub fn memory_connection(title: &str, volume: &str) -> serde_json::Value {
        json!({
            "id": "",
            "title": title,
            "url": "https://cdn.example.com",
            "processor": { "alias": "json" },
            "deployer": { "alias": "memory", "volume": volume }
        })
    }

    /// A connection writing YAML files below `root` (absolute, or relative to the storage dir).
    pub fn filesystem_connection(title: &str, root: &str) -> serde_json::Value {
        json!({
            "id": "",
            "title": title,
            "processor": { "alias": "yaml" },
            "deployer": {
                "alias": "filesystem",
                "path": root,
                "fileExtension": ".yml"
            }
        })
    }
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that an error body mentions `needle`.
    pub fn error_contains(body: &Value, needle: &str) {
        let message = body["error"].as_str().unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected error to contain '{needle}'\nActual: {body}"
        );
    }

    /// Assert that a JSON array holds exactly the given ids, in order.
    pub fn ids_eq(array: &Value, expected: &[&str]) {
        let ids: Vec<&str> = array
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(ids, expected, "id mismatch in {array}");
    }
}
