use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::deployer::{MediaDeployer, deployer_for};
use super::thumbnail::{ThumbnailGenerator, Thumbnailer};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{MediaEntry, MediaRecord, ProjectContext};

/// Deployed filename of the generated derivative within a media folder.
const THUMBNAIL_NAME: &str = "thumbnail.png";

/// An uploaded media payload. Content arrives base64-encoded, as the editing
/// client submits it.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Caller-assigned identifier; a v4 uuid is minted when absent.
    pub id: Option<String>,
    pub filename: String,
    pub content: String,
}

/// How a save call wants the deployed thumbnail handled.
#[derive(Debug, Clone)]
pub enum ThumbnailUpdate {
    /// Remove the deployed thumbnail.
    Remove,
    /// Deploy this base64 payload verbatim.
    Set(String),
}

/// Partial update for an existing media resource.
#[derive(Debug, Clone, Default)]
pub struct MediaSave {
    pub filename: Option<String>,
    /// Full replacement payload, base64-encoded. Triggers a re-deploy.
    pub content: Option<String>,
    /// `None` means: regenerate automatically when new content is supplied,
    /// otherwise leave the deployed thumbnail alone.
    pub thumbnail: Option<ThumbnailUpdate>,
}

/// Media resource operations for one environment: persisted records in the
/// store, bytes with the configured deployer.
///
/// Record and byte writes are not transactional. A failure between the two
/// leaves an inconsistent pair, which the read paths tolerate by unioning both
/// sources; retried creates are safe because deployment clears the target
/// folder first.
pub struct MediaService {
    store: Arc<dyn Store>,
    deployer: Box<dyn MediaDeployer>,
    thumbnails: Box<dyn Thumbnailer>,
}

impl MediaService {
    pub fn new(
        store: Arc<dyn Store>,
        deployer: Box<dyn MediaDeployer>,
        thumbnails: Box<dyn Thumbnailer>,
    ) -> Self {
        Self {
            store,
            deployer,
            thumbnails,
        }
    }

    /// Builds the service for an environment from server configuration.
    /// Environments without a deployer binding have media disabled.
    pub fn from_config(
        store: Arc<dyn Store>,
        config: &ServerConfig,
        environment_id: &str,
    ) -> Result<Self> {
        let settings = config
            .deployer_settings(environment_id)
            .ok_or_else(|| Error::NoDeployerConfigured(environment_id.to_string()))?;

        let deployer = deployer_for(settings)?;
        let thumbnails = Box::new(ThumbnailGenerator::new(config.data_dir.join("tmp")));
        Ok(Self::new(store, deployer, thumbnails))
    }

    /// Creates a media resource: persists the record, then deploys the file
    /// and (for raster images) a generated thumbnail.
    pub async fn create(&self, ctx: &ProjectContext, upload: MediaUpload) -> Result<MediaEntry> {
        if upload.filename.is_empty() {
            return Err(Error::BadRequest("filename cannot be empty".to_string()));
        }
        let content = decode_payload(&upload.content)?;

        let record = MediaRecord {
            id: upload.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            project_id: ctx.project_id.clone(),
            environment_id: ctx.environment_id.clone(),
            filename: upload.filename,
            created_at: Utc::now(),
        };

        match self.store.create_media_record(&record) {
            Ok(()) => {}
            // A retried create after a failed deploy finds the record already
            // persisted; refresh it and fall through so the clear+deploy path
            // runs again.
            Err(Error::AlreadyExists) => {
                self.store
                    .update_media_filename(ctx, &record.id, &record.filename)?;
            }
            Err(e) => return Err(e),
        }
        self.deploy(&record.id, &record.filename, &content, None, true)
            .await?;

        debug!("media '{}' created as {}", record.id, record.filename);
        self.get(ctx, &record.id)
            .await?
            .ok_or(Error::NotFound)
    }

    /// Fetches one media entry, reconciling the record with deployed files. A
    /// deployed file with no record still yields a synthesized, metadata-less
    /// entry.
    pub async fn get(&self, ctx: &ProjectContext, id: &str) -> Result<Option<MediaEntry>> {
        let record = self.store.get_media_record(ctx, id)?;
        let (deployed_filename, has_thumbnail) = self.deployed_state(id).await?;

        let entry = match (record, deployed_filename) {
            (Some(record), deployed) => {
                let url = deployed
                    .as_deref()
                    .map(|name| self.deployer.public_url(&self.deployer.path(id, &[name])));
                MediaEntry {
                    id: record.id,
                    filename: record.filename,
                    url,
                    has_thumbnail,
                    created_at: Some(record.created_at),
                }
            }
            (None, Some(filename)) => {
                let url = self
                    .deployer
                    .public_url(&self.deployer.path(id, &[&filename]));
                MediaEntry {
                    id: id.to_string(),
                    filename,
                    url: Some(url),
                    has_thumbnail,
                    created_at: None,
                }
            }
            (None, None) => return Ok(None),
        };

        Ok(Some(entry))
    }

    /// Lists all media for the environment: the union of persisted records and
    /// deployed folders keyed by identifier, sorted by display name.
    pub async fn list(&self, ctx: &ProjectContext) -> Result<Vec<MediaEntry>> {
        struct Deployed {
            filename: Option<String>,
            has_thumbnail: bool,
        }

        let mut deployed: BTreeMap<String, Deployed> = BTreeMap::new();
        for token in self.deployer.list_folder(&self.deployer.root(), 2).await? {
            let segments: Vec<&str> = token.split('/').collect();
            let &[_, id, filename] = segments.as_slice() else {
                continue;
            };

            let state = deployed.entry(id.to_string()).or_insert(Deployed {
                filename: None,
                has_thumbnail: false,
            });
            if filename == THUMBNAIL_NAME {
                state.has_thumbnail = true;
            } else if state.filename.is_none() {
                state.filename = Some(filename.to_string());
            }
        }

        let mut entries = Vec::new();
        for record in self.store.list_media_records(ctx)? {
            let state = deployed.remove(&record.id);
            let (deployed_filename, has_thumbnail) = match state {
                Some(state) => (state.filename, state.has_thumbnail),
                None => (None, false),
            };
            let url = deployed_filename.as_deref().map(|name| {
                self.deployer
                    .public_url(&self.deployer.path(&record.id, &[name]))
            });

            entries.push(MediaEntry {
                id: record.id,
                filename: record.filename,
                url,
                has_thumbnail,
                created_at: Some(record.created_at),
            });
        }

        // Whatever remains was deployed without a record.
        for (id, state) in deployed {
            let Some(filename) = state.filename else {
                continue;
            };
            let url = self.deployer.public_url(&self.deployer.path(&id, &[&filename]));
            entries.push(MediaEntry {
                id,
                filename,
                url: Some(url),
                has_thumbnail: state.has_thumbnail,
                created_at: None,
            });
        }

        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Applies a partial update; see [`MediaSave`] for the thumbnail rules.
    pub async fn save(&self, ctx: &ProjectContext, id: &str, save: MediaSave) -> Result<MediaEntry> {
        let record = self.store.get_media_record(ctx, id)?.ok_or(Error::NotFound)?;

        let filename = match save.filename {
            Some(filename) if filename != record.filename => {
                self.store.update_media_filename(ctx, id, &filename)?;
                filename
            }
            Some(filename) => filename,
            None => record.filename,
        };

        if let Some(encoded) = save.content {
            let content = decode_payload(&encoded)?;
            match save.thumbnail {
                Some(ThumbnailUpdate::Set(thumb)) => {
                    let thumb = decode_payload(&thumb)?;
                    self.deploy(id, &filename, &content, Some(&thumb), false)
                        .await?;
                }
                Some(ThumbnailUpdate::Remove) => {
                    // Deployment clears the folder, so skipping regeneration
                    // is all removal takes.
                    self.deploy(id, &filename, &content, None, false).await?;
                }
                None => self.deploy(id, &filename, &content, None, true).await?,
            }
        } else {
            match save.thumbnail {
                Some(ThumbnailUpdate::Remove) => {
                    self.deployer
                        .remove_file(&self.deployer.path(id, &[THUMBNAIL_NAME]))
                        .await?;
                }
                Some(ThumbnailUpdate::Set(thumb)) => {
                    let thumb = decode_payload(&thumb)?;
                    self.deployer
                        .set_file(&self.deployer.path(id, &[THUMBNAIL_NAME]), &thumb)
                        .await?;
                }
                None => {}
            }
        }

        self.get(ctx, id).await?.ok_or(Error::NotFound)
    }

    /// Deletes the record, then the entire deployed folder. Not transactional:
    /// a failure in between orphans the folder, which `get` then surfaces as a
    /// synthesized entry.
    pub async fn remove(&self, ctx: &ProjectContext, id: &str) -> Result<()> {
        self.store.delete_media_record(ctx, id)?;
        self.deployer
            .remove_folder(&self.deployer.path(id, &[]))
            .await
    }

    /// Clears the media folder and deploys content plus thumbnail. Clearing
    /// first makes identifier reuse and retries idempotent.
    async fn deploy(
        &self,
        id: &str,
        filename: &str,
        content: &[u8],
        explicit_thumbnail: Option<&[u8]>,
        regenerate: bool,
    ) -> Result<()> {
        let folder = self.deployer.path(id, &[]);
        self.deployer.remove_folder(&folder).await?;

        self.deployer
            .set_file(&self.deployer.path(id, &[filename]), content)
            .await?;

        let thumbnail = match explicit_thumbnail {
            Some(bytes) => Some(bytes.to_vec()),
            None if regenerate => self.thumbnails.generate(filename, content).await?,
            None => None,
        };

        if let Some(bytes) = thumbnail {
            self.deployer
                .set_file(&self.deployer.path(id, &[THUMBNAIL_NAME]), &bytes)
                .await?;
        }

        Ok(())
    }

    async fn deployed_state(&self, id: &str) -> Result<(Option<String>, bool)> {
        let folder = self.deployer.path(id, &[]);
        let tokens = self.deployer.list_folder(&folder, 1).await?;

        let mut filename = None;
        let mut has_thumbnail = false;
        for token in tokens {
            let Some(name) = token.rsplit('/').next() else {
                continue;
            };
            if name == THUMBNAIL_NAME {
                has_thumbnail = true;
            } else if filename.is_none() {
                filename = Some(name.to_string());
            }
        }

        Ok((filename, has_thumbnail))
    }
}

fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| Error::BadRequest(format!("invalid base64 payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::LocalDeployer;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    fn ctx() -> ProjectContext {
        ProjectContext::new("project", "live")
    }

    fn service(temp_dir: &TempDir) -> MediaService {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        MediaService::new(
            Arc::new(store),
            Box::new(LocalDeployer::new(temp_dir.path().join("deployed"))),
            Box::new(ThumbnailGenerator::new(temp_dir.path().join("tmp"))),
        )
    }

    /// Converter stub that hands back fixed bytes for .png content and nothing
    /// for everything else.
    struct FixedThumbnailer;

    #[async_trait::async_trait]
    impl Thumbnailer for FixedThumbnailer {
        async fn generate(&self, filename: &str, _content: &[u8]) -> Result<Option<Vec<u8>>> {
            if filename.ends_with(".png") {
                Ok(Some(b"fixed-thumb".to_vec()))
            } else {
                Ok(None)
            }
        }
    }

    fn service_with_thumbnailer(temp_dir: &TempDir) -> MediaService {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        MediaService::new(
            Arc::new(store),
            Box::new(LocalDeployer::new(temp_dir.path().join("deployed"))),
            Box::new(FixedThumbnailer),
        )
    }

    fn upload(id: &str, filename: &str, content: &[u8]) -> MediaUpload {
        MediaUpload {
            id: Some(id.to_string()),
            filename: filename.to_string(),
            content: BASE64.encode(content),
        }
    }

    #[tokio::test]
    async fn test_create_svg_deploys_file_without_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let entry = service
            .create(&ctx(), upload("abc", "logo.svg", b"<svg/>"))
            .await
            .unwrap();

        assert_eq!(entry.filename, "logo.svg");
        assert!(entry.url.is_some());
        assert!(!entry.has_thumbnail);
        assert!(entry.created_at.is_some());

        let deployed = temp_dir.path().join("deployed/media/abc/logo.svg");
        assert_eq!(std::fs::read(deployed).unwrap(), b"<svg/>");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_base64() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let result = service
            .create(
                &ctx(),
                MediaUpload {
                    id: None,
                    filename: "x.txt".to_string(),
                    content: "not base64!!!".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_clears_previous_folder() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("abc", "old.svg", b"old"))
            .await
            .unwrap();
        service.remove(&ctx(), "abc").await.unwrap();
        service
            .create(&ctx(), upload("abc", "new.svg", b"new"))
            .await
            .unwrap();

        assert!(!temp_dir.path().join("deployed/media/abc/old.svg").exists());
        assert!(temp_dir.path().join("deployed/media/abc/new.svg").exists());
    }

    #[tokio::test]
    async fn test_create_retry_redeploys_after_failed_deploy() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("abc", "logo.svg", b"<svg/>"))
            .await
            .unwrap();

        // Simulate a create that persisted the record but died before the
        // bytes landed.
        service.deployer.remove_folder("media/abc").await.unwrap();
        assert!(!temp_dir.path().join("deployed/media/abc/logo.svg").exists());

        let entry = service
            .create(&ctx(), upload("abc", "logo.svg", b"<svg/>"))
            .await
            .unwrap();
        assert!(entry.url.is_some());
        assert!(temp_dir.path().join("deployed/media/abc/logo.svg").exists());
    }

    #[tokio::test]
    async fn test_create_raster_image_deploys_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with_thumbnailer(&temp_dir);

        let entry = service
            .create(&ctx(), upload("abc", "photo.png", b"png-bytes"))
            .await
            .unwrap();
        assert!(entry.has_thumbnail);

        let folder = temp_dir.path().join("deployed/media/abc");
        assert_eq!(std::fs::read(folder.join("photo.png")).unwrap(), b"png-bytes");
        assert_eq!(
            std::fs::read(folder.join("thumbnail.png")).unwrap(),
            b"fixed-thumb"
        );
    }

    #[tokio::test]
    async fn test_get_synthesizes_entry_for_orphan_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        // File deployed out-of-band, no database record.
        service
            .deployer
            .set_file("media/ghost/photo.svg", b"x")
            .await
            .unwrap();

        let entry = service.get(&ctx(), "ghost").await.unwrap().unwrap();
        assert_eq!(entry.filename, "photo.svg");
        assert!(entry.created_at.is_none());
    }

    #[tokio::test]
    async fn test_remove_then_get_honors_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("abc", "doc.svg", b"x"))
            .await
            .unwrap();
        service.remove(&ctx(), "abc").await.unwrap();
        assert!(service.get(&ctx(), "abc").await.unwrap().is_none());

        // Simulate a remove that failed between the two steps: the record is
        // gone but the folder survived.
        service
            .create(&ctx(), upload("def", "doc.svg", b"x"))
            .await
            .unwrap();
        service.store.delete_media_record(&ctx(), "def").unwrap();

        let entry = service.get(&ctx(), "def").await.unwrap().unwrap();
        assert!(entry.created_at.is_none());
        assert_eq!(entry.filename, "doc.svg");
    }

    #[tokio::test]
    async fn test_list_unions_records_and_files_sorted_by_name() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("b", "banana.svg", b"x"))
            .await
            .unwrap();

        // Record without a deployed file.
        service
            .store
            .create_media_record(&MediaRecord {
                id: "a".to_string(),
                project_id: "project".to_string(),
                environment_id: "live".to_string(),
                filename: "apple.txt".to_string(),
                created_at: Utc::now(),
            })
            .unwrap();

        // Deployed file without a record.
        service
            .deployer
            .set_file("media/c/cherry.svg", b"x")
            .await
            .unwrap();

        let entries = service.list(&ctx()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["apple.txt", "banana.svg", "cherry.svg"]);

        let apple = &entries[0];
        assert!(apple.url.is_none());
        assert!(apple.created_at.is_some());

        let cherry = &entries[2];
        assert!(cherry.url.is_some());
        assert!(cherry.created_at.is_none());
    }

    #[tokio::test]
    async fn test_save_new_content_redeploys() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("abc", "v1.svg", b"one"))
            .await
            .unwrap();

        let entry = service
            .save(
                &ctx(),
                "abc",
                MediaSave {
                    filename: Some("v2.svg".to_string()),
                    content: Some(BASE64.encode(b"two")),
                    thumbnail: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(entry.filename, "v2.svg");
        assert!(!temp_dir.path().join("deployed/media/abc/v1.svg").exists());
        let deployed = temp_dir.path().join("deployed/media/abc/v2.svg");
        assert_eq!(std::fs::read(deployed).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_save_explicit_thumbnail_handling() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service
            .create(&ctx(), upload("abc", "logo.svg", b"x"))
            .await
            .unwrap();

        // Explicit payload deployed verbatim, even for formats that would not
        // get an automatic thumbnail.
        let entry = service
            .save(
                &ctx(),
                "abc",
                MediaSave {
                    thumbnail: Some(ThumbnailUpdate::Set(BASE64.encode(b"thumb-bytes"))),
                    ..MediaSave::default()
                },
            )
            .await
            .unwrap();
        assert!(entry.has_thumbnail);

        let thumb = temp_dir.path().join("deployed/media/abc/thumbnail.png");
        assert_eq!(std::fs::read(&thumb).unwrap(), b"thumb-bytes");

        let entry = service
            .save(
                &ctx(),
                "abc",
                MediaSave {
                    thumbnail: Some(ThumbnailUpdate::Remove),
                    ..MediaSave::default()
                },
            )
            .await
            .unwrap();
        assert!(!entry.has_thumbnail);
        assert!(!thumb.exists());
    }

    #[tokio::test]
    async fn test_save_missing_record_fails() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let result = service.save(&ctx(), "ghost", MediaSave::default()).await;
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
