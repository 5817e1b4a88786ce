//! Vision adapter module. Implements VisionPort for image analysis.
//!
//! Provides the Azure Computer Vision adapter and a mock adapter for
//! running without credentials.

pub mod azure_adapter;
pub mod mock_adapter;

pub use azure_adapter::AzureVisionAdapter;
pub use mock_adapter::MockVisionAdapter;
