//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Vision analysis failed: {0}")]
    Vision(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Prompt error: {0}")]
    Prompt(String),
}
