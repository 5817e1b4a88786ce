//! Image library: upload files from disk, list them, load stored bytes.
//!
//! Blobs are kept as standard base64 text so the repository never has to
//! understand image formats. Uploads are size-capped before encoding; the
//! vision API rejects oversized payloads anyway, so they never get stored.

use crate::domain::{DomainError, ImageRecord, ImageSummary};
use crate::ports::ImageRepoPort;
use base64::{engine::general_purpose, Engine as _};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct LibraryService {
    images: Arc<dyn ImageRepoPort>,
    /// Upload cap in decoded bytes.
    max_image_bytes: usize,
}

impl LibraryService {
    pub fn new(images: Arc<dyn ImageRepoPort>, max_image_bytes: usize) -> Self {
        Self {
            images,
            max_image_bytes,
        }
    }

    /// Read an image file and store it in the user's library.
    ///
    /// Keeps the original filename (path stripped). Empty files and files
    /// above the size cap are rejected before anything is written.
    pub async fn upload(&self, user_id: i64, path: &Path) -> Result<ImageRecord, DomainError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::Image(format!("read {}: {}", path.display(), e)))?;
        if bytes.is_empty() {
            return Err(DomainError::Image("File is empty".into()));
        }
        if bytes.len() > self.max_image_bytes {
            return Err(DomainError::Image(format!(
                "File is {} bytes; the limit is {} bytes",
                bytes.len(),
                self.max_image_bytes
            )));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let content_base64 = general_purpose::STANDARD.encode(&bytes);

        let record = self
            .images
            .save_image(user_id, &filename, &content_base64, bytes.len() as i64)
            .await?;
        info!(
            user_id,
            image_id = record.id,
            filename = %record.filename,
            bytes = record.byte_len,
            "image uploaded"
        );
        Ok(record)
    }

    /// The user's images without blobs, newest first.
    pub async fn list(&self, user_id: i64) -> Result<Vec<ImageSummary>, DomainError> {
        self.images.list_images(user_id).await
    }

    /// Fetch one stored image and decode its blob back to raw bytes.
    pub async fn load_bytes(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<(ImageRecord, Vec<u8>), DomainError> {
        let record = self
            .images
            .get_image(user_id, image_id)
            .await?
            .ok_or_else(|| DomainError::Image("Invalid image selected".into()))?;
        let bytes = general_purpose::STANDARD
            .decode(record.content_base64.as_bytes())
            .map_err(|e| DomainError::Image(format!("corrupt image blob: {}", e)))?;
        Ok((record, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeImages {
        rows: Mutex<Vec<ImageRecord>>,
    }

    #[async_trait::async_trait]
    impl ImageRepoPort for FakeImages {
        async fn save_image(
            &self,
            user_id: i64,
            filename: &str,
            content_base64: &str,
            byte_len: i64,
        ) -> Result<ImageRecord, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            let record = ImageRecord {
                id: rows.len() as i64 + 1,
                user_id,
                filename: filename.to_string(),
                content_base64: content_base64.to_string(),
                byte_len,
                uploaded_at: 0,
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn list_images(&self, user_id: i64) -> Result<Vec<ImageSummary>, DomainError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|r| r.user_id == user_id)
                .map(|r| ImageSummary {
                    id: r.id,
                    user_id: r.user_id,
                    filename: r.filename.clone(),
                    byte_len: r.byte_len,
                    uploaded_at: r.uploaded_at,
                })
                .collect())
        }

        async fn get_image(
            &self,
            user_id: i64,
            image_id: i64,
        ) -> Result<Option<ImageRecord>, DomainError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|r| r.user_id == user_id && r.id == image_id)
                .cloned())
        }
    }

    fn service(max_image_bytes: usize) -> (LibraryService, Arc<FakeImages>) {
        let repo = Arc::new(FakeImages::default());
        let service = LibraryService::new(
            Arc::clone(&repo) as Arc<dyn ImageRepoPort>,
            max_image_bytes,
        );
        (service, repo)
    }

    async fn temp_file(name: &str, content: &[u8]) -> std::path::PathBuf {
        // Per-process dir so `name` stays the basename (upload stores it).
        let dir = std::env::temp_dir().join(format!("img-lens-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_and_load_round_trip() {
        let (library, _) = service(1024);
        let content = b"\x89PNG\r\n\x1a\nfake pixels";
        let path = temp_file("roundtrip.png", content).await;

        let record = library.upload(7, &path).await.unwrap();
        assert_eq!(record.filename, "roundtrip.png");
        assert_eq!(record.byte_len, content.len() as i64);

        let (loaded, bytes) = library.load_bytes(7, record.id).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(bytes, content);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let (library, _) = service(1024);
        let path = temp_file("empty.jpg", b"").await;

        let err = library.upload(7, &path).await.unwrap_err();
        assert!(err.to_string().contains("File is empty"));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let (library, repo) = service(8);
        let path = temp_file("big.jpg", b"way more than eight bytes").await;

        let err = library.upload(7, &path).await.unwrap_err();
        assert!(err.to_string().contains("limit is 8 bytes"));
        assert!(repo.rows.lock().unwrap().is_empty()); // rejected before storage

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_load_bytes_unknown_id_is_an_image_error() {
        let (library, _) = service(1024);
        let err = library.load_bytes(7, 99).await.unwrap_err();
        assert!(err.to_string().contains("Invalid image selected"));
    }

    #[tokio::test]
    async fn test_load_bytes_rejects_corrupt_blob() {
        let (library, repo) = service(1024);
        repo.rows.lock().unwrap().push(ImageRecord {
            id: 1,
            user_id: 7,
            filename: "bad.png".into(),
            content_base64: "!!! not base64 !!!".into(),
            byte_len: 3,
            uploaded_at: 0,
        });

        let err = library.load_bytes(7, 1).await.unwrap_err();
        assert!(err.to_string().contains("corrupt image blob"));
    }

    #[tokio::test]
    async fn test_images_are_scoped_per_user() {
        let (library, _) = service(1024);
        let path = temp_file("mine.png", b"\x89PNG owner seven").await;
        let record = library.upload(7, &path).await.unwrap();

        assert!(library.load_bytes(8, record.id).await.is_err());
        assert_eq!(library.list(8).await.unwrap().len(), 0);
        assert_eq!(library.list(7).await.unwrap().len(), 1);

        tokio::fs::remove_file(&path).await.ok();
    }
}
