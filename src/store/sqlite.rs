use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, handy for tests and embedders.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_config(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid schema config in database: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    })
}

fn row_to_schema_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SchemaRecord> {
    Ok(SchemaRecord {
        project_id: row.get(0)?,
        environment_id: row.get(1)?,
        id: row.get(2)?,
        name: row.get(3)?,
        icon: row.get(4)?,
        parent_schema_id: row.get(5)?,
        type_tag: row.get(6)?,
        config: parse_config(&row.get::<_, String>(7)?),
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

const SCHEMA_COLUMNS: &str = "project_id, environment_id, id, name, icon, parent_schema_id, \
                              type_tag, config, created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Custom schema records

    fn create_schema_record(&self, record: &SchemaRecord) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO schemas (project_id, environment_id, id, name, icon, parent_schema_id,
                                  type_tag, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.project_id,
                record.environment_id,
                record.id,
                record.name,
                record.icon,
                record.parent_schema_id,
                record.type_tag,
                record.config.to_string(),
                format_datetime(&record.created_at),
                format_datetime(&record.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_schema_record(&self, ctx: &ProjectContext, id: &str) -> Result<Option<SchemaRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {SCHEMA_COLUMNS} FROM schemas
                 WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3"
            ),
            params![ctx.project_id, ctx.environment_id, id],
            row_to_schema_record,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_schema_records(&self, ctx: &ProjectContext) -> Result<Vec<SchemaRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCHEMA_COLUMNS} FROM schemas
             WHERE project_id = ?1 AND environment_id = ?2 ORDER BY id"
        ))?;

        let rows = stmt.query_map(
            params![ctx.project_id, ctx.environment_id],
            row_to_schema_record,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_schema_record(&self, record: &SchemaRecord) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE schemas
             SET name = ?4, icon = ?5, parent_schema_id = ?6, type_tag = ?7, config = ?8,
                 updated_at = ?9
             WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3",
            params![
                record.project_id,
                record.environment_id,
                record.id,
                record.name,
                record.icon,
                record.parent_schema_id,
                record.type_tag,
                record.config.to_string(),
                format_datetime(&Utc::now()),
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_schema_record(&self, ctx: &ProjectContext, id: &str) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM schemas WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3",
            params![ctx.project_id, ctx.environment_id, id],
        )?;
        Ok(deleted > 0)
    }

    // Media records

    fn create_media_record(&self, record: &MediaRecord) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO media (project_id, environment_id, id, filename, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.project_id,
                record.environment_id,
                record.id,
                record.filename,
                format_datetime(&record.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_media_record(&self, ctx: &ProjectContext, id: &str) -> Result<Option<MediaRecord>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT project_id, environment_id, id, filename, created_at FROM media
             WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3",
            params![ctx.project_id, ctx.environment_id, id],
            |row| {
                Ok(MediaRecord {
                    project_id: row.get(0)?,
                    environment_id: row.get(1)?,
                    id: row.get(2)?,
                    filename: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_media_records(&self, ctx: &ProjectContext) -> Result<Vec<MediaRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT project_id, environment_id, id, filename, created_at FROM media
             WHERE project_id = ?1 AND environment_id = ?2 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![ctx.project_id, ctx.environment_id], |row| {
            Ok(MediaRecord {
                project_id: row.get(0)?,
                environment_id: row.get(1)?,
                id: row.get(2)?,
                filename: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_media_filename(&self, ctx: &ProjectContext, id: &str, filename: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE media SET filename = ?4
             WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3",
            params![ctx.project_id, ctx.environment_id, id, filename],
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_media_record(&self, ctx: &ProjectContext, id: &str) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM media WHERE project_id = ?1 AND environment_id = ?2 AND id = ?3",
            params![ctx.project_id, ctx.environment_id, id],
        )?;
        Ok(deleted > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn ctx() -> ProjectContext {
        ProjectContext::new("project", "live")
    }

    fn schema_record(id: &str) -> SchemaRecord {
        SchemaRecord {
            project_id: "project".to_string(),
            environment_id: "live".to_string(),
            id: id.to_string(),
            name: id.to_string(),
            icon: None,
            parent_schema_id: None,
            type_tag: "content".to_string(),
            config: json!({"title": {}}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_schema_record_round_trip() {
        let store = test_store();
        store.create_schema_record(&schema_record("article")).unwrap();

        let fetched = store.get_schema_record(&ctx(), "article").unwrap().unwrap();
        assert_eq!(fetched.id, "article");
        assert_eq!(fetched.config, json!({"title": {}}));

        assert!(store.get_schema_record(&ctx(), "missing").unwrap().is_none());
    }

    #[test]
    fn test_schema_record_scoping() {
        let store = test_store();
        store.create_schema_record(&schema_record("article")).unwrap();

        let other = ProjectContext::new("project", "draft");
        assert!(store.get_schema_record(&other, "article").unwrap().is_none());
        assert!(store.list_schema_records(&other).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_schema_record_conflicts() {
        let store = test_store();
        store.create_schema_record(&schema_record("article")).unwrap();

        let err = store.create_schema_record(&schema_record("article")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));
    }

    #[test]
    fn test_update_and_delete_schema_record() {
        let store = test_store();
        store.create_schema_record(&schema_record("article")).unwrap();

        let mut record = schema_record("article");
        record.name = "Updated Article".to_string();
        store.update_schema_record(&record).unwrap();

        let fetched = store.get_schema_record(&ctx(), "article").unwrap().unwrap();
        assert_eq!(fetched.name, "Updated Article");

        assert!(store.delete_schema_record(&ctx(), "article").unwrap());
        assert!(!store.delete_schema_record(&ctx(), "article").unwrap());
    }

    #[test]
    fn test_media_record_round_trip() {
        let store = test_store();
        let record = MediaRecord {
            project_id: "project".to_string(),
            environment_id: "live".to_string(),
            id: "abc".to_string(),
            filename: "photo.jpg".to_string(),
            created_at: Utc::now(),
        };
        store.create_media_record(&record).unwrap();

        let fetched = store.get_media_record(&ctx(), "abc").unwrap().unwrap();
        assert_eq!(fetched.filename, "photo.jpg");

        store.update_media_filename(&ctx(), "abc", "renamed.jpg").unwrap();
        let fetched = store.get_media_record(&ctx(), "abc").unwrap().unwrap();
        assert_eq!(fetched.filename, "renamed.jpg");

        assert!(store.delete_media_record(&ctx(), "abc").unwrap());
        assert!(store.get_media_record(&ctx(), "abc").unwrap().is_none());
    }
}
