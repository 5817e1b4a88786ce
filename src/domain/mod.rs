//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod comparison;
pub mod entities;
pub mod errors;

pub use entities::{
    AnalysisRecord, ComparisonOutcome, ImageAnalysis, ImageRecord, ImageSummary, Tag, User,
};
pub use errors::DomainError;
