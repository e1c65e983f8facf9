use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SchemaRecord;

/// On-disk schema document. One JSON file per identifier; the containing
/// directory supplies the type tag, so the document itself never carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_schema_id: Option<String>,
    #[serde(default)]
    pub config: Value,
}

/// Broad schema categories callers can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Content,
    Field,
}

/// Type-specific schema payload. The `type` tag found on disk or in the store
/// picks the variant; unrecognized tags fall back to `Generic` with the tag
/// preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaPayload {
    /// Field definitions for a content type, keyed by field name.
    Content { fields: BTreeMap<String, Value> },
    /// Editor configuration for a field type, keyed by option name.
    Field { editor: BTreeMap<String, Value> },
    Generic { tag: String, config: Value },
}

impl SchemaPayload {
    /// Single resolving factory from a raw type tag and config payload.
    pub fn from_config(type_tag: &str, config: Value) -> Self {
        match type_tag {
            "content" => Self::Content {
                fields: object_entries(config),
            },
            "field" => Self::Field {
                editor: object_entries(config),
            },
            other => Self::Generic {
                tag: other.to_string(),
                config,
            },
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Self::Content { .. } => "content",
            Self::Field { .. } => "field",
            Self::Generic { tag, .. } => tag,
        }
    }

    pub fn kind(&self) -> Option<SchemaKind> {
        match self {
            Self::Content { .. } => Some(SchemaKind::Content),
            Self::Field { .. } => Some(SchemaKind::Field),
            Self::Generic { .. } => None,
        }
    }

    /// Config payload as stored on disk or in a schema record.
    pub fn to_config(&self) -> Value {
        match self {
            Self::Content { fields } => Value::Object(fields.clone().into_iter().collect()),
            Self::Field { editor } => Value::Object(editor.clone().into_iter().collect()),
            Self::Generic { config, .. } => config.clone(),
        }
    }
}

fn object_entries(config: Value) -> BTreeMap<String, Value> {
    match config {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

/// A schema as seen by callers, regardless of which tier it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_schema_id: Option<String>,
    /// True for built-in and plugin schemas; they are immutable in-process.
    pub locked: bool,
    #[serde(flatten)]
    pub payload: SchemaPayload,
}

impl Schema {
    /// Instantiates a schema from an on-disk definition file.
    pub fn from_definition(
        id: impl Into<String>,
        type_tag: &str,
        definition: SchemaDefinition,
        locked: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: definition.name,
            icon: definition.icon,
            parent_schema_id: definition.parent_schema_id,
            locked,
            payload: SchemaPayload::from_config(type_tag, definition.config),
        }
    }

    /// Instantiates a user-customized schema from its persisted record.
    pub fn from_record(record: SchemaRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            icon: record.icon,
            parent_schema_id: record.parent_schema_id,
            locked: false,
            payload: SchemaPayload::from_config(&record.type_tag, record.config),
        }
    }

    pub fn type_tag(&self) -> &str {
        self.payload.type_tag()
    }

    pub fn kind(&self) -> Option<SchemaKind> {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factory_picks_variant_from_tag() {
        let def = SchemaDefinition {
            name: "Article".to_string(),
            icon: Some("file".to_string()),
            parent_schema_id: Some("page".to_string()),
            config: json!({"body": {"schemaId": "richText"}}),
        };
        let schema = Schema::from_definition("article", "content", def, true);

        assert!(schema.locked);
        assert_eq!(schema.kind(), Some(SchemaKind::Content));
        match &schema.payload {
            SchemaPayload::Content { fields } => assert!(fields.contains_key("body")),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_factory_falls_back_to_generic() {
        let def = SchemaDefinition {
            name: "Widget".to_string(),
            icon: None,
            parent_schema_id: None,
            config: json!({"anything": true}),
        };
        let schema = Schema::from_definition("widget", "widget", def, false);

        assert_eq!(schema.kind(), None);
        assert_eq!(schema.type_tag(), "widget");
    }

    #[test]
    fn test_config_round_trip() {
        let config = json!({"title": {"schemaId": "string"}});
        let payload = SchemaPayload::from_config("content", config.clone());
        assert_eq!(payload.to_config(), config);
    }
}
