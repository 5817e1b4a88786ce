//! img-lens: Terminal image library with vision analysis and tag-based
//! comparison, built on Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
