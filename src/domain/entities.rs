//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/database types here — these are mapped from adapters.

use serde::{Deserialize, Serialize};

/// A registered account. Password is stored only as a bcrypt hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// A stored library image, including the blob. Images are kept as base64
/// text so the store never has to understand the format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub content_base64: String,
    /// Decoded size in bytes (kept alongside so list views never touch the blob).
    pub byte_len: i64,
    /// Unix seconds.
    pub uploaded_at: i64,
}

/// Library listing entry: `ImageRecord` without the blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub byte_len: i64,
    pub uploaded_at: i64,
}

/// One weighted label returned by the vision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// In [0, 1].
    pub confidence: f64,
}

impl Tag {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Structured output of vision analysis for one image. Immutable once
/// obtained. `tags` keeps the order the service returned; comparison
/// consumes only `description` and `tags`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub description: String,
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub categories: Vec<Tag>,
    #[serde(default)]
    pub objects: Vec<Tag>,
}

/// A persisted analysis, one per image. Filename is denormalized so
/// reports and history exports don't need a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub image_id: i64,
    pub user_id: i64,
    pub filename: String,
    pub analysis: ImageAnalysis,
    /// Unix seconds.
    pub analyzed_at: i64,
}

/// Result of comparing two analyses. Derived value; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutcome {
    /// Tag-set similarity in [0, 100].
    pub similarity: f64,
    pub summary: String,
}
