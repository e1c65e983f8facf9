use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Server configuration, loadable from a `loam.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    /// Per-environment settings keyed by environment id.
    pub environments: HashMap<String, EnvironmentConfig>,
}

/// Settings scoped to a single environment within a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Media deployer binding. Absence disables media for the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<DeployerSettings>,
}

/// Names a deployer implementation plus its connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerSettings {
    /// Implementation alias, e.g. "local".
    pub alias: String,
    /// Root directory for disk-backed deployers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Public base URL deployed paths are served under
    /// (e.g., "https://media.example.com"). If not set, URLs fall back to the
    /// deployer's own notion of a reachable location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl ServerConfig {
    /// Reads configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("loam.db")
    }

    /// Root of built-in schema definition files.
    #[must_use]
    pub fn schemas_dir(&self) -> PathBuf {
        self.data_dir.join("schemas")
    }

    /// Root under which plugins ship their own `schemas/` directories.
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    pub fn deployer_settings(&self, environment_id: &str) -> Option<&DeployerSettings> {
        self.environments
            .get(environment_id)
            .and_then(|env| env.deployer.as_ref())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            environments: HashMap::new(),
        }
    }
}
