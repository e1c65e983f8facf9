use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::ProjectContext;

/// A remote synchronization source holding peer-defined copies of resources.
///
/// The sync service itself lives outside this crate; resource lookups only
/// consume this contract. Resource payloads are opaque JSON, shaped like the
/// corresponding persisted records.
#[async_trait]
pub trait SyncSource: Send + Sync {
    /// Fetches a single peer-defined resource, if the peer has one.
    async fn get_resource_item(
        &self,
        ctx: &ProjectContext,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<Value>>;

    /// Merges peer-defined resources into a local list, returning the
    /// combined view. Implementations decide which side is authoritative.
    async fn merge_resource(
        &self,
        ctx: &ProjectContext,
        resource_type: &str,
        local: Vec<Value>,
    ) -> Result<Vec<Value>>;
}

/// Disabled synchronization: remote lookups find nothing and local lists pass
/// through unchanged.
pub struct NoSync;

#[async_trait]
impl SyncSource for NoSync {
    async fn get_resource_item(
        &self,
        _ctx: &ProjectContext,
        _resource_type: &str,
        _id: &str,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn merge_resource(
        &self,
        _ctx: &ProjectContext,
        _resource_type: &str,
        local: Vec<Value>,
    ) -> Result<Vec<Value>> {
        Ok(local)
    }
}
