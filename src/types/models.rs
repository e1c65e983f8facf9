use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope for persisted resources. Every custom schema and media record belongs
/// to exactly one project+environment pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: String,
    pub environment_id: String,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<String>, environment_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            environment_id: environment_id.into(),
        }
    }
}

/// A user-customized schema as stored in the database. Built-in and plugin
/// schemas never pass through here; they live in the startup registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_schema_id: Option<String>,
    pub type_tag: String,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Merged read view over media records and deployed files. Deployed files with
/// no database record still surface here, filename-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEntry {
    pub id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub has_thumbnail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
