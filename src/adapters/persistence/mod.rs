//! Persistence adapters. SQLite for durable data, JSON for the session.

pub mod session_json;
pub mod sqlite_repo;

pub use session_json::SessionJson;
pub use sqlite_repo::SqliteRepo;
