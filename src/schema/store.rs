use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::model::{Schema, SchemaDefinition, SchemaKind};
use super::registry::SchemaRegistry;
use super::resolve::merge;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::sync::SyncSource;
use crate::types::{ProjectContext, SchemaRecord};

const RESOURCE_TYPE: &str = "schemas";

/// Narrows the tiers `SchemaStore::get` searches.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Skip built-in and plugin schemas.
    pub custom_only: bool,
    /// Only built-in and plugin schemas; skips the store and sync tiers.
    pub native_only: bool,
    /// Never consult the remote synchronization source.
    pub local_only: bool,
    /// Merge inherited field definitions down the parent chain.
    pub with_parent_fields: bool,
}

impl GetOptions {
    #[must_use]
    pub fn resolved() -> Self {
        Self {
            with_parent_fields: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Restrict the union to content or field schemas. Generic-tagged schemas
    /// never match a kind filter.
    pub kind: Option<SchemaKind>,
}

/// Resolves schemas across three overlapping sources: the startup registry
/// (built-in + plugin files), user-customized records in the store, and a
/// remote synchronization source. Earlier tiers win; resolution short-circuits
/// on the first hit.
pub struct SchemaStore {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
    sync: Arc<dyn SyncSource>,
}

impl SchemaStore {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn Store>,
        sync: Arc<dyn SyncSource>,
    ) -> Self {
        Self {
            registry,
            store,
            sync,
        }
    }

    /// Resolves a schema by identifier, honoring tier narrowing and optional
    /// parent-field merging.
    pub async fn get(
        &self,
        ctx: &ProjectContext,
        id: &str,
        options: &GetOptions,
    ) -> Result<Option<Schema>> {
        match self.lookup(ctx, id, options).await? {
            Some(schema) if options.with_parent_fields => {
                Ok(Some(self.resolve_parents(ctx, schema).await?))
            }
            found => Ok(found),
        }
    }

    async fn lookup(
        &self,
        ctx: &ProjectContext,
        id: &str,
        options: &GetOptions,
    ) -> Result<Option<Schema>> {
        if !options.custom_only {
            if let Some(schema) = self.registry.get(id) {
                return Ok(Some(schema.clone()));
            }
        }

        if !options.native_only {
            if let Some(record) = self.store.get_schema_record(ctx, id)? {
                return Ok(Some(Schema::from_record(record)));
            }
        }

        if !options.local_only && !options.native_only {
            if let Some(value) = self.sync.get_resource_item(ctx, RESOURCE_TYPE, id).await? {
                let record: SchemaRecord = serde_json::from_value(value)?;
                debug!("schema '{id}' resolved from sync source");
                return Ok(Some(Schema::from_record(record)));
            }
        }

        Ok(None)
    }

    /// Walks the parent chain leaf-to-root, merging each ancestor's payload
    /// into the accumulated schema. A revisited identifier fails fast instead
    /// of recursing forever.
    async fn resolve_parents(&self, ctx: &ProjectContext, leaf: Schema) -> Result<Schema> {
        let mut visited: HashSet<String> = HashSet::from([leaf.id.clone()]);
        let mut next_parent = leaf.parent_schema_id.clone();
        let mut effective = leaf;

        while let Some(parent_id) = next_parent {
            if !visited.insert(parent_id.clone()) {
                return Err(Error::SchemaCycle(parent_id));
            }

            // Parents resolve through the full tier order regardless of how
            // the leaf lookup was narrowed.
            let parent = self
                .lookup(ctx, &parent_id, &GetOptions::default())
                .await?
                .ok_or(Error::NotFound)?;

            next_parent = parent.parent_schema_id.clone();
            effective = merge(effective, &parent)?;
        }

        Ok(effective)
    }

    /// Unions built-in + plugin + custom + synchronized schemas, filtered by
    /// the requested kind. Tiers are not de-duplicated by identifier; later
    /// tiers are authoritative overrides for callers that care.
    pub async fn list(&self, ctx: &ProjectContext, options: &ListOptions) -> Result<Vec<Schema>> {
        let mut schemas: Vec<Schema> = self.registry.all().cloned().collect();

        let local: Vec<Value> = self
            .store
            .list_schema_records(ctx)?
            .into_iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;

        let merged = self.sync.merge_resource(ctx, RESOURCE_TYPE, local).await?;
        for value in merged {
            let record: SchemaRecord = serde_json::from_value(value)?;
            schemas.push(Schema::from_record(record));
        }

        if let Some(kind) = options.kind {
            schemas.retain(|s| s.kind() == Some(kind));
        }

        schemas.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(schemas)
    }

    /// Creates a user-customized schema record after validating its parent
    /// reference.
    pub async fn create_custom(&self, ctx: &ProjectContext, record: SchemaRecord) -> Result<()> {
        self.validate(ctx, &record).await?;
        self.store.create_schema_record(&record)
    }

    pub async fn update_custom(&self, ctx: &ProjectContext, record: SchemaRecord) -> Result<()> {
        self.validate(ctx, &record).await?;
        self.store.update_schema_record(&record)
    }

    /// Deletes a custom schema record. Locked (built-in/plugin) schemas are
    /// untouched; only the custom tier is writable.
    pub fn delete_custom(&self, ctx: &ProjectContext, id: &str) -> Result<bool> {
        self.store.delete_schema_record(ctx, id)
    }

    /// Synthesizes a custom schema record from an external schema document.
    pub async fn import(
        &self,
        ctx: &ProjectContext,
        id: &str,
        type_tag: &str,
        definition: SchemaDefinition,
    ) -> Result<SchemaRecord> {
        let now = Utc::now();
        let record = SchemaRecord {
            id: id.to_string(),
            project_id: ctx.project_id.clone(),
            environment_id: ctx.environment_id.clone(),
            name: definition.name,
            icon: definition.icon,
            parent_schema_id: definition.parent_schema_id,
            type_tag: type_tag.to_string(),
            config: definition.config,
            created_at: now,
            updated_at: now,
        };

        self.validate(ctx, &record).await?;
        self.store.create_schema_record(&record)?;
        Ok(record)
    }

    async fn validate(&self, ctx: &ProjectContext, record: &SchemaRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(Error::BadRequest("schema id cannot be empty".to_string()));
        }
        if record.name.is_empty() {
            return Err(Error::BadRequest("schema name cannot be empty".to_string()));
        }

        if let Some(parent_id) = &record.parent_schema_id {
            let parent = self
                .lookup(ctx, parent_id, &GetOptions::default())
                .await?
                .ok_or(Error::NotFound)?;

            if parent.type_tag() != record.type_tag {
                return Err(Error::ParentMismatch {
                    child: record.id.clone(),
                    parent: parent_id.clone(),
                });
            }
        }

        Ok(())
    }
}
