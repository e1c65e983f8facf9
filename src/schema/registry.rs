use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::{Schema, SchemaDefinition};
use crate::error::{Error, Result};

/// Read-only registry of built-in and plugin schemas, built once at startup.
///
/// Definition files live at `<root>/<type-tag>/<id>.json`; the lower-cased
/// directory name supplies the type tag. Built-in schemas come from
/// `<data>/schemas`, plugin schemas from `<data>/plugins/*/schemas`. All
/// registry schemas are locked.
#[derive(Debug)]
pub struct SchemaRegistry {
    builtin: HashMap<String, Schema>,
    plugin: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn build(data_dir: &Path) -> Result<Self> {
        let builtin = scan_root(&data_dir.join("schemas"))?;

        let mut plugin = HashMap::new();
        for root in plugin_schema_roots(data_dir)? {
            plugin.extend(scan_root(&root)?);
        }

        debug!(
            "schema registry built: {} built-in, {} plugin",
            builtin.len(),
            plugin.len()
        );

        Ok(Self { builtin, plugin })
    }

    /// Empty registry, for embedders that only use custom schemas.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builtin: HashMap::new(),
            plugin: HashMap::new(),
        }
    }

    /// Looks up a schema by identifier. Built-in wins over plugin when both
    /// define the same id.
    pub fn get(&self, id: &str) -> Option<&Schema> {
        self.builtin.get(id).or_else(|| self.plugin.get(id))
    }

    /// All registry schemas, built-in tier first. Identifiers defined by both
    /// tiers appear twice; de-duplication is the caller's concern.
    pub fn all(&self) -> impl Iterator<Item = &Schema> {
        self.builtin.values().chain(self.plugin.values())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builtin.len() + self.plugin.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builtin.is_empty() && self.plugin.is_empty()
    }
}

fn plugin_schema_roots(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = data_dir.join("plugins").join("*").join("schemas");
    let pattern = pattern.to_string_lossy();

    let paths = glob::glob(&pattern).map_err(|e| Error::Config(e.to_string()))?;
    Ok(paths.flatten().filter(|p| p.is_dir()).collect())
}

fn scan_root(root: &Path) -> Result<HashMap<String, Schema>> {
    let mut schemas = HashMap::new();
    if !root.is_dir() {
        return Ok(schemas);
    }

    let pattern = root.join("**").join("*.json");
    let paths = glob::glob(&pattern.to_string_lossy()).map_err(|e| Error::Config(e.to_string()))?;

    for path in paths.flatten() {
        let (id, type_tag) = identify(root, &path)?;

        let contents = std::fs::read_to_string(&path)?;
        let definition: SchemaDefinition = match serde_json::from_str(&contents) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("skipping malformed schema file {}: {e}", path.display());
                continue;
            }
        };

        debug!("registered schema '{id}' ({type_tag}) from {}", path.display());
        schemas.insert(
            id.clone(),
            Schema::from_definition(id, &type_tag, definition, true),
        );
    }

    Ok(schemas)
}

/// Derives (identifier, type tag) from a definition file path. A file sitting
/// directly in the root has no type directory and is rejected.
fn identify(root: &Path, path: &Path) -> Result<(String, String)> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::MissingTypeTag(path.display().to_string()))?;

    let type_tag = relative
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| Error::MissingTypeTag(path.display().to_string()))?;

    let id = path
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::MissingTypeTag(path.display().to_string()))?
        .to_string();

    Ok((id, type_tag))
}
