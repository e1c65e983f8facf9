use async_trait::async_trait;

use super::local::LocalDeployer;
use crate::config::DeployerSettings;
use crate::error::{Error, Result};

/// Where media bytes live. Implementations expose a uniform path/list/write/
/// delete contract; the media service never touches storage directly.
///
/// Path tokens are opaque to callers: '/'-separated strings minted by
/// [`MediaDeployer::path`] and only meaningful to the deployer that made them.
#[async_trait]
pub trait MediaDeployer: Send + Sync {
    /// Path token for a media identifier, extended with extra segments
    /// (e.g. a filename).
    fn path(&self, id: &str, segments: &[&str]) -> String;

    /// Path token for the folder all media lives under.
    fn root(&self) -> String {
        "media".to_string()
    }

    /// Lists deployed files at or below a path, descending at most `depth`
    /// directory levels. Folders themselves are not returned.
    async fn list_folder(&self, path: &str, depth: usize) -> Result<Vec<String>>;

    async fn set_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Removes a single file. Removing a path that does not exist is not an
    /// error.
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Removes a folder and everything below it. Idempotent.
    async fn remove_folder(&self, path: &str) -> Result<()>;

    /// Maps a deployed path to a browser-reachable URL.
    fn public_url(&self, path: &str) -> String;
}

/// Config-time registry of deployer implementations. The settings alias picks
/// the concrete type; connection parameters are interpreted per alias.
pub fn deployer_for(settings: &DeployerSettings) -> Result<Box<dyn MediaDeployer>> {
    match settings.alias.as_str() {
        "local" => Ok(Box::new(LocalDeployer::from_settings(settings)?)),
        other => Err(Error::Config(format!("unknown deployer alias '{other}'"))),
    }
}
