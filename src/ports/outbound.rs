//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{AnalysisRecord, DomainError, ImageAnalysis, ImageRecord, ImageSummary, User};

/// Vision analysis service. Turns raw image bytes into a structured analysis.
#[async_trait::async_trait]
pub trait VisionPort: Send + Sync {
    /// Analyze one image. `image` must hold the complete encoded file;
    /// the adapter never sees partial or streamed buffers.
    async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, DomainError>;
}

/// User repository. Account lookup and creation.
#[async_trait::async_trait]
pub trait UserRepoPort: Send + Sync {
    /// Create an account. The username must be unique; a duplicate maps to
    /// an Auth error so registration can surface it verbatim.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DomainError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, DomainError>;
}

/// Image repository. Stores uploads as base64 text per user.
#[async_trait::async_trait]
pub trait ImageRepoPort: Send + Sync {
    /// Insert an upload and return the stored record with its assigned id.
    async fn save_image(
        &self,
        user_id: i64,
        filename: &str,
        content_base64: &str,
        byte_len: i64,
    ) -> Result<ImageRecord, DomainError>;

    /// List a user's images without blobs, newest first.
    async fn list_images(&self, user_id: i64) -> Result<Vec<ImageSummary>, DomainError>;

    /// Load one image including the blob. None when the id does not exist
    /// or belongs to another user.
    async fn get_image(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<ImageRecord>, DomainError>;
}

/// Analysis log. At most one persisted analysis per image; a hit makes
/// repeat analysis and comparison free.
#[async_trait::async_trait]
pub trait AnalysisLogPort: Send + Sync {
    /// Persist an analysis. Re-saving the same image replaces the entry.
    async fn save_analysis(&self, record: &AnalysisRecord) -> Result<(), DomainError>;

    async fn get_analysis(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<AnalysisRecord>, DomainError>;

    /// All of a user's analyses, newest first.
    async fn get_history(&self, user_id: i64) -> Result<Vec<AnalysisRecord>, DomainError>;
}

/// Session store. Persists the authenticated user across restarts.
#[async_trait::async_trait]
pub trait SessionPort: Send + Sync {
    /// Currently logged-in user id, if any.
    async fn current_user_id(&self) -> Result<Option<i64>, DomainError>;

    async fn set_current_user(&self, user_id: i64) -> Result<(), DomainError>;

    async fn clear(&self) -> Result<(), DomainError>;
}
