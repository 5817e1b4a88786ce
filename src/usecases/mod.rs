//! Application use cases. Orchestrate domain logic via ports.

pub mod analysis_service;
pub mod auth_service;
pub mod comparison_service;
pub mod library_service;

pub use analysis_service::AnalysisService;
pub use auth_service::AuthService;
pub use comparison_service::ComparisonService;
pub use library_service::LibraryService;
