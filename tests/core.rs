use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tempfile::TempDir;

use loam::config::{DeployerSettings, EnvironmentConfig, ServerConfig};
use loam::media::{LocalDeployer, MediaService, MediaUpload, ThumbnailGenerator};
use loam::schema::{GetOptions, SchemaPayload, SchemaRegistry, SchemaStore};
use loam::store::{SqliteStore, Store};
use loam::sync::NoSync;
use loam::types::ProjectContext;

fn ctx() -> ProjectContext {
    ProjectContext::new("project", "live")
}

fn write_schema(data_dir: &std::path::Path, type_tag: &str, id: &str, body: &str) {
    let typed = data_dir.join("schemas").join(type_tag);
    std::fs::create_dir_all(&typed).unwrap();
    std::fs::write(typed.join(format!("{id}.json")), body).unwrap();
}

#[tokio::test]
async fn test_article_inherits_page_fields() {
    let temp_dir = TempDir::new().unwrap();
    write_schema(
        temp_dir.path(),
        "content",
        "page",
        r#"{"name": "Page", "config": {"title": {"schemaId": "string"}}}"#,
    );
    write_schema(
        temp_dir.path(),
        "content",
        "article",
        r#"{"name": "Article", "parentSchemaId": "page", "config": {"body": {"schemaId": "richText"}}}"#,
    );

    let store = SqliteStore::in_memory().unwrap();
    store.initialize().unwrap();
    let schemas = SchemaStore::new(
        Arc::new(SchemaRegistry::build(temp_dir.path()).unwrap()),
        Arc::new(store),
        Arc::new(NoSync),
    );

    let plain = schemas
        .get(&ctx(), "article", &GetOptions::default())
        .await
        .unwrap()
        .unwrap();
    match &plain.payload {
        SchemaPayload::Content { fields } => {
            assert!(!fields.contains_key("title"));
        }
        other => panic!("unexpected payload: {other:?}"),
    }

    let effective = schemas
        .get(&ctx(), "article", &GetOptions::resolved())
        .await
        .unwrap()
        .unwrap();
    match &effective.payload {
        SchemaPayload::Content { fields } => {
            assert!(fields.contains_key("title"));
            assert!(fields.contains_key("body"));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn test_media_lifecycle_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(temp_dir.path().join("loam.db")).unwrap());
    store.initialize().unwrap();

    let media = MediaService::new(
        store.clone(),
        Box::new(LocalDeployer::new(temp_dir.path().join("deployed"))),
        Box::new(ThumbnailGenerator::new(temp_dir.path().join("tmp"))),
    );

    let created = media
        .create(
            &ctx(),
            MediaUpload {
                id: Some("hero".to_string()),
                filename: "hero.svg".to_string(),
                content: BASE64.encode(b"<svg/>"),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.url.as_deref(), Some("/media/hero/hero.svg"));
    assert!(!created.has_thumbnail);

    let listed = media.list(&ctx()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "hero");

    media.remove(&ctx(), "hero").await.unwrap();
    assert!(media.get(&ctx(), "hero").await.unwrap().is_none());
    assert!(media.list(&ctx()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_environment_without_deployer_disables_media() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.initialize().unwrap();

    let mut environments = HashMap::new();
    environments.insert(
        "live".to_string(),
        EnvironmentConfig {
            deployer: Some(DeployerSettings {
                alias: "local".to_string(),
                path: Some(temp_dir.path().join("deployed")),
                public_base_url: None,
            }),
        },
    );
    let config = ServerConfig {
        data_dir: temp_dir.path().to_path_buf(),
        environments,
    };

    assert!(MediaService::from_config(store.clone(), &config, "live").is_ok());
    assert!(matches!(
        MediaService::from_config(store, &config, "draft"),
        Err(loam::error::Error::NoDeployerConfigured(env)) if env == "draft"
    ));
}
