use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::deployer::MediaDeployer;
use crate::config::DeployerSettings;
use crate::error::{Error, Result};

/// Disk-backed media deployer. Path tokens map directly onto a directory tree
/// under `base_path`; writes go through a temp file + rename so readers never
/// observe partial content.
pub struct LocalDeployer {
    base_path: PathBuf,
    public_base_url: Option<String>,
}

impl LocalDeployer {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: None,
        }
    }

    pub fn from_settings(settings: &DeployerSettings) -> Result<Self> {
        let base_path = settings
            .path
            .clone()
            .ok_or_else(|| Error::Config("local deployer requires a 'path' setting".to_string()))?;

        Ok(Self {
            base_path,
            public_base_url: settings.public_base_url.clone(),
        })
    }

    fn fs_path(&self, path: &str) -> Result<PathBuf> {
        let mut out = self.base_path.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(Error::BadRequest(format!("invalid path token: {path}")));
            }
            out.push(segment);
        }
        Ok(out)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    fn token_for(&self, fs_path: &Path) -> Option<String> {
        let relative = fs_path.strip_prefix(&self.base_path).ok()?;
        let segments: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments.join("/"))
    }
}

#[async_trait]
impl MediaDeployer for LocalDeployer {
    fn path(&self, id: &str, segments: &[&str]) -> String {
        let mut token = format!("media/{id}");
        for segment in segments {
            token.push('/');
            token.push_str(segment);
        }
        token
    }

    async fn list_folder(&self, path: &str, depth: usize) -> Result<Vec<String>> {
        let root = self.fs_path(path)?;
        let mut files = Vec::new();
        collect_files(&root, depth, &mut files).await?;

        let mut tokens: Vec<String> = files
            .iter()
            .filter_map(|p| self.token_for(p))
            .collect();
        tokens.sort();
        Ok(tokens)
    }

    async fn set_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(content).await?;
        temp_file.sync_all().await?;

        let final_path = self.fs_path(path)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, &final_path).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.fs_path(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn remove_folder(&self, path: &str) -> Result<()> {
        match fs::remove_dir_all(self.fs_path(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn public_url(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{path}", base.trim_end_matches('/')),
            None => format!("/{path}"),
        }
    }
}

fn collect_files<'a>(
    path: &'a Path,
    depth: usize,
    files: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let metadata = fs::metadata(&entry_path).await?;

            if metadata.is_file() {
                files.push(entry_path);
            } else if metadata.is_dir() && depth > 0 {
                collect_files(&entry_path, depth - 1, files).await?;
            }
        }

        Ok(())
    })
}
