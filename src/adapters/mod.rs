//! Infrastructure adapters. Implement outbound ports.
//!
//! Vision API, persistence, export tools, terminal UI. Map errors to DomainError.

pub mod persistence;
pub mod tools;
pub mod ui;
pub mod vision;
