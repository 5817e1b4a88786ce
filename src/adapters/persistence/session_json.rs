//! Implements SessionPort using a JSON file.
//!
//! Remembers the logged-in user so a restart lands back in their library.

use crate::domain::DomainError;
use crate::ports::SessionPort;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionData {
    current_user_id: Option<i64>,
}

/// JSON file-based session storage.
pub struct SessionJson {
    path: std::path::PathBuf,
    cache: tokio::sync::RwLock<SessionData>,
}

impl SessionJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(SessionData::default()),
        }
    }

    /// Load the session from disk. Call after construction. A missing or
    /// malformed file reads as logged out.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => SessionData::default(),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    /// Atomic save using write-replace:
    /// 1. Write to temp file
    /// 2. sync_all() to ensure flush to disk
    /// 3. Atomic rename to target path
    async fn save(&self) -> Result<(), DomainError> {
        let data = self.cache.read().await;
        let json = serde_json::to_string_pretty(&*data)
            .map_err(|e| DomainError::Session(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Session(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Session(format!("write temp file: {}", e)))?;
        // Ensure data is flushed to disk before rename
        f.sync_all()
            .await
            .map_err(|e| DomainError::Session(format!("sync temp file: {}", e)))?;
        drop(f); // Close file handle before rename

        // Atomic rename: replaces target file in one operation
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Session(format!("atomic rename failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionPort for SessionJson {
    async fn current_user_id(&self) -> Result<Option<i64>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.current_user_id)
    }

    async fn set_current_user(&self, user_id: i64) -> Result<(), DomainError> {
        {
            let mut cache = self.cache.write().await;
            cache.current_user_id = Some(user_id);
        }
        self.save().await
    }

    async fn clear(&self) -> Result<(), DomainError> {
        {
            let mut cache = self.cache.write().await;
            cache.current_user_id = None;
        }
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "img-lens-session-{}-{}.json",
            std::process::id(),
            tag
        ))
    }

    #[tokio::test]
    async fn test_set_get_clear_round_trip() {
        let path = session_path("round-trip");
        let session = SessionJson::new(&path);
        session.load().await.unwrap();

        assert_eq!(session.current_user_id().await.unwrap(), None);

        session.set_current_user(42).await.unwrap();
        assert_eq!(session.current_user_id().await.unwrap(), Some(42));

        session.clear().await.unwrap();
        assert_eq!(session.current_user_id().await.unwrap(), None);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_session_survives_a_restart() {
        let path = session_path("restart");
        {
            let session = SessionJson::new(&path);
            session.load().await.unwrap();
            session.set_current_user(7).await.unwrap();
        }

        let reopened = SessionJson::new(&path);
        reopened.load().await.unwrap();
        assert_eq!(reopened.current_user_id().await.unwrap(), Some(7));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_logged_out() {
        let session = SessionJson::new(session_path("missing"));
        session.load().await.unwrap();
        assert_eq!(session.current_user_id().await.unwrap(), None);
    }
}
