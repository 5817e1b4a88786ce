//! SQLite-backed storage via libsql. One adapter implements the user,
//! image, and analysis-log ports.
//!
//! A single database file (library.db) holds all three tables. Image blobs
//! are stored as base64 TEXT; analysis tag lists are JSON columns so the
//! schema never chases the vision API's shape.

use crate::domain::{
    AnalysisRecord, DomainError, ImageAnalysis, ImageRecord, ImageSummary, Tag, User,
};
use crate::ports::{AnalysisLogPort, ImageRepoPort, UserRepoPort};
use libsql::{params, Database};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
)"#;

const IMAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    content_base64 TEXT NOT NULL,
    byte_len INTEGER NOT NULL,
    uploaded_at INTEGER NOT NULL
)"#;
const IMAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_images_user_uploaded ON images (user_id, uploaded_at DESC)";

/// At most one analysis per image; re-analyzing replaces the row.
const ANALYSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS analyses (
    image_id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    tags_json TEXT NOT NULL DEFAULT '[]',
    categories_json TEXT NOT NULL DEFAULT '[]',
    objects_json TEXT NOT NULL DEFAULT '[]',
    analyzed_at INTEGER NOT NULL
)"#;
const ANALYSES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_analyses_user_analyzed ON analyses (user_id, analyzed_at DESC)";

/// SQLite repository. One database file (library.db) in the given base
/// directory; all users share it.
pub struct SqliteRepo {
    db: Database,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("library.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Repo(e.to_string()))?;

        // WAL mode enables concurrent readers + one writer.
        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Repo(format!("WAL pragma failed: {}", e)))?;
        while wal_rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some()
        {}
        // synchronous=NORMAL is safe with WAL and faster than FULL.
        let mut sync_rows = conn
            .query("PRAGMA synchronous=NORMAL", ())
            .await
            .map_err(|e| DomainError::Repo(format!("synchronous pragma failed: {}", e)))?;
        while sync_rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some()
        {}

        conn.execute(USERS_TABLE, ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        conn.execute(IMAGES_TABLE, ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        conn.execute(IMAGES_INDEX, ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        conn.execute(ANALYSES_TABLE, ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        conn.execute(ANALYSES_INDEX, ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db })
    }

    fn tags_to_json(tags: &[Tag]) -> String {
        serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
    }

    /// Lenient read: a malformed column yields an empty list, not an error.
    fn json_to_tags(s: &str) -> Vec<Tag> {
        serde_json::from_str(s).unwrap_or_default()
    }

    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn row_to_analysis(row: &libsql::Row) -> Result<AnalysisRecord, DomainError> {
        let image_id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
        let user_id: i64 = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
        let filename: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
        let description: String = row.get::<String>(3).unwrap_or_default();
        let tags_json: String = row.get::<String>(4).unwrap_or_default();
        let categories_json: String = row.get::<String>(5).unwrap_or_default();
        let objects_json: String = row.get::<String>(6).unwrap_or_default();
        let analyzed_at: i64 = row.get(7).map_err(|e| DomainError::Repo(e.to_string()))?;

        Ok(AnalysisRecord {
            image_id,
            user_id,
            filename,
            analysis: ImageAnalysis {
                description,
                tags: Self::json_to_tags(&tags_json),
                categories: Self::json_to_tags(&categories_json),
                objects: Self::json_to_tags(&objects_json),
            },
            analyzed_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepoPort for SqliteRepo {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let created_at = Self::now_unix();

        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        )
        .await
        .map_err(|e| {
            // Registration pre-checks the name, so this only fires on a race.
            if e.to_string().contains("UNIQUE") {
                DomainError::Auth("Username already exists".to_string())
            } else {
                DomainError::Repo(e.to_string())
            }
        })?;

        let id = conn.last_insert_rowid();
        info!(user_id = id, username, "user created");

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = conn
            .query(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Ok(Some(User {
                id: row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?,
                username: row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?,
                password_hash: row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?,
                created_at: row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = conn
            .query(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Ok(Some(User {
                id: row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?,
                username: row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?,
                password_hash: row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?,
                created_at: row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?,
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl ImageRepoPort for SqliteRepo {
    async fn save_image(
        &self,
        user_id: i64,
        filename: &str,
        content_base64: &str,
        byte_len: i64,
    ) -> Result<ImageRecord, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let uploaded_at = Self::now_unix();

        conn.execute(
            r#"
            INSERT INTO images (user_id, filename, content_base64, byte_len, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![user_id, filename, content_base64, byte_len, uploaded_at],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;

        let id = conn.last_insert_rowid();
        info!(user_id, image_id = id, filename, byte_len, "image saved");

        Ok(ImageRecord {
            id,
            user_id,
            filename: filename.to_string(),
            content_base64: content_base64.to_string(),
            byte_len,
            uploaded_at,
        })
    }

    async fn list_images(&self, user_id: i64) -> Result<Vec<ImageSummary>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        // The blob column stays out of list views.
        let mut rows = conn
            .query(
                r#"
                SELECT id, user_id, filename, byte_len, uploaded_at
                FROM images
                WHERE user_id = ?1
                ORDER BY uploaded_at DESC, id DESC
                "#,
                params![user_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        let mut images = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            images.push(ImageSummary {
                id: row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?,
                user_id: row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?,
                filename: row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?,
                byte_len: row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?,
                uploaded_at: row.get(4).map_err(|e| DomainError::Repo(e.to_string()))?,
            });
        }
        Ok(images)
    }

    async fn get_image(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<ImageRecord>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, user_id, filename, content_base64, byte_len, uploaded_at
                FROM images
                WHERE user_id = ?1 AND id = ?2
                "#,
                params![user_id, image_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Ok(Some(ImageRecord {
                id: row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?,
                user_id: row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?,
                filename: row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?,
                content_base64: row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?,
                byte_len: row.get(4).map_err(|e| DomainError::Repo(e.to_string()))?,
                uploaded_at: row.get(5).map_err(|e| DomainError::Repo(e.to_string()))?,
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl AnalysisLogPort for SqliteRepo {
    async fn save_analysis(&self, record: &AnalysisRecord) -> Result<(), DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO analyses (image_id, user_id, filename, description, tags_json, categories_json, objects_json, analyzed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (image_id) DO UPDATE SET
                user_id = excluded.user_id,
                filename = excluded.filename,
                description = excluded.description,
                tags_json = excluded.tags_json,
                categories_json = excluded.categories_json,
                objects_json = excluded.objects_json,
                analyzed_at = excluded.analyzed_at
            "#,
            params![
                record.image_id,
                record.user_id,
                record.filename.as_str(),
                record.analysis.description.as_str(),
                Self::tags_to_json(&record.analysis.tags),
                Self::tags_to_json(&record.analysis.categories),
                Self::tags_to_json(&record.analysis.objects),
                record.analyzed_at
            ],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;

        info!(
            user_id = record.user_id,
            image_id = record.image_id,
            tags = record.analysis.tags.len(),
            "analysis saved"
        );
        Ok(())
    }

    async fn get_analysis(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<AnalysisRecord>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = conn
            .query(
                r#"
                SELECT image_id, user_id, filename, description, tags_json, categories_json, objects_json, analyzed_at
                FROM analyses
                WHERE image_id = ?1 AND user_id = ?2
                "#,
                params![image_id, user_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Ok(Some(Self::row_to_analysis(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn get_history(&self, user_id: i64) -> Result<Vec<AnalysisRecord>, DomainError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = conn
            .query(
                r#"
                SELECT image_id, user_id, filename, description, tags_json, categories_json, objects_json, analyzed_at
                FROM analyses
                WHERE user_id = ?1
                ORDER BY analyzed_at DESC, image_id DESC
                "#,
                params![user_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            records.push(Self::row_to_analysis(&row)?);
        }
        Ok(records)
    }
}
