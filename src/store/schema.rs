pub const SCHEMA: &str = r#"
-- User-customized schemas; built-in and plugin schemas live on disk
CREATE TABLE IF NOT EXISTS schemas (
    project_id TEXT NOT NULL,
    environment_id TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    icon TEXT,
    parent_schema_id TEXT,
    type_tag TEXT NOT NULL,

    -- Type-specific payload as JSON: field definitions for content schemas,
    -- editor configuration for field schemas
    config TEXT NOT NULL DEFAULT '{}',

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    PRIMARY KEY (project_id, environment_id, id)
);

-- Media metadata; bytes are deployed through the configured deployer
CREATE TABLE IF NOT EXISTS media (
    project_id TEXT NOT NULL,
    environment_id TEXT NOT NULL,
    id TEXT NOT NULL,
    filename TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    PRIMARY KEY (project_id, environment_id, id)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_schemas_scope ON schemas(project_id, environment_id);
CREATE INDEX IF NOT EXISTS idx_media_scope ON media(project_id, environment_id);
"#;
