mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface for persisted CMS resources.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Custom schema records (scoped to project+environment)
    fn create_schema_record(&self, record: &SchemaRecord) -> Result<()>;
    fn get_schema_record(&self, ctx: &ProjectContext, id: &str) -> Result<Option<SchemaRecord>>;
    fn list_schema_records(&self, ctx: &ProjectContext) -> Result<Vec<SchemaRecord>>;
    fn update_schema_record(&self, record: &SchemaRecord) -> Result<()>;
    fn delete_schema_record(&self, ctx: &ProjectContext, id: &str) -> Result<bool>;

    // Media records (scoped to project+environment; bytes live with a deployer)
    fn create_media_record(&self, record: &MediaRecord) -> Result<()>;
    fn get_media_record(&self, ctx: &ProjectContext, id: &str) -> Result<Option<MediaRecord>>;
    fn list_media_records(&self, ctx: &ProjectContext) -> Result<Vec<MediaRecord>>;
    fn update_media_filename(&self, ctx: &ProjectContext, id: &str, filename: &str) -> Result<()>;
    fn delete_media_record(&self, ctx: &ProjectContext, id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
