use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};

const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_WIDTH: u32 = 200;
pub const DEFAULT_HEIGHT: u32 = 200;

/// Derives a scaled raster preview from uploaded content.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// Returns `None` when the content has no raster thumbnail.
    async fn generate(&self, filename: &str, content: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Produces scaled raster derivatives by shelling out to ImageMagick.
///
/// Each invocation works in its own uuid-named directory under `tmp_dir`, so
/// concurrent generations never share paths. The working directory is removed
/// on every exit path, including conversion failure.
pub struct ThumbnailGenerator {
    tmp_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ThumbnailGenerator {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    async fn convert(&self, work_dir: &Path, filename: &str, content: &[u8]) -> Result<Vec<u8>> {
        // Only the final component; uploaded filenames are not trusted paths.
        let source_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| Error::BadRequest(format!("invalid filename: {filename}")))?;
        let source = work_dir.join(source_name);
        let target = work_dir.join("thumbnail.png");

        fs::write(&source, content).await?;

        let mut cmd = Command::new("convert");
        cmd.arg(&source)
            .arg("-auto-orient")
            .arg("-thumbnail")
            .arg(format!("{}x{}", self.width, self.height))
            .arg(&target);

        let output = tokio::time::timeout(CONVERT_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::ExternalProcess("image conversion timed out".to_string()))?
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Error::ExternalProcess("ImageMagick 'convert' not found".to_string())
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalProcess(format!(
                "convert exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(fs::read(&target).await?)
    }
}

#[async_trait]
impl Thumbnailer for ThumbnailGenerator {
    /// Returns `None` for content that has no raster thumbnail: non-image
    /// files and SVG (vector, not rasterized).
    async fn generate(&self, filename: &str, content: &[u8]) -> Result<Option<Vec<u8>>> {
        if !is_raster_image(filename) {
            return Ok(None);
        }

        let work_dir = self.tmp_dir.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&work_dir).await?;

        let result = self.convert(&work_dir, filename, content).await;

        if let Err(e) = fs::remove_dir_all(&work_dir).await {
            warn!("failed to clean up thumbnail workspace {}: {e}", work_dir.display());
        }

        result.map(Some)
    }
}

/// Formats the converter can rasterize. SVG is deliberately absent.
fn is_raster_image(filename: &str) -> bool {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    matches!(
        extension.as_deref(),
        Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tif" | "tiff")
    )
}
