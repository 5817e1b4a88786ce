//! Mock vision adapter for running without an API key.
//!
//! Sniffs the image format from magic bytes and fabricates a deterministic
//! analysis so the whole flow (reports, history, comparison) works offline.

use crate::domain::{DomainError, ImageAnalysis, Tag};
use crate::ports::VisionPort;
use std::time::Duration;
use tracing::info;

/// Mock vision adapter.
///
/// Returns deterministic responses derived from the image bytes without
/// making API calls. Simulates network latency with configurable delay.
pub struct MockVisionAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockVisionAdapter {
    /// Create a new mock adapter with default delay (100ms).
    pub fn new() -> Self {
        Self { delay_ms: 100 }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for MockVisionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort format sniff from magic bytes.
fn sniff_format(image: &[u8]) -> &'static str {
    if image.starts_with(&[0xff, 0xd8, 0xff]) {
        "jpeg"
    } else if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if image.starts_with(b"GIF8") {
        "gif"
    } else if image.starts_with(b"BM") {
        "bmp"
    } else if image.len() >= 12 && image.starts_with(b"RIFF") && &image[8..12] == b"WEBP" {
        "webp"
    } else {
        "binary"
    }
}

fn size_bucket(len: usize) -> &'static str {
    if len < 16 * 1024 {
        "small"
    } else if len < 1024 * 1024 {
        "medium"
    } else {
        "large"
    }
}

#[async_trait::async_trait]
impl VisionPort for MockVisionAdapter {
    async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, DomainError> {
        info!(bytes = image.len(), "[MOCK] Simulating vision analysis");

        // Simulate network delay
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let format = sniff_format(image);
        let bucket = size_bucket(image.len());

        Ok(ImageAnalysis {
            description: format!(
                "[MOCK] A {} {} image of {} bytes. Configure a vision API key for real analysis.",
                bucket,
                format,
                image.len()
            ),
            tags: vec![
                Tag::new(format, 0.95),
                Tag::new(bucket, 0.80),
                Tag::new("mock", 0.50),
            ],
            categories: vec![Tag::new("others_", 0.5)],
            objects: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_adapter_is_deterministic() {
        let adapter = MockVisionAdapter::with_delay(10);
        let bytes = b"\x89PNG\r\n\x1a\nfake image data";

        let first = adapter.analyze(bytes).await.unwrap();
        let second = adapter.analyze(bytes).await.unwrap();

        assert_eq!(first, second);
        assert!(first.description.starts_with("[MOCK]"));
        assert_eq!(first.tags.len(), 3);
    }

    #[test]
    fn test_sniffs_common_formats() {
        assert_eq!(sniff_format(&[0xff, 0xd8, 0xff, 0xe0]), "jpeg");
        assert_eq!(sniff_format(b"\x89PNG\r\n\x1a\n"), "png");
        assert_eq!(sniff_format(b"GIF89a"), "gif");
        assert_eq!(sniff_format(b"BMxxxx"), "bmp");
        assert_eq!(sniff_format(b"RIFF\x00\x00\x00\x00WEBP"), "webp");
        assert_eq!(sniff_format(b"not an image"), "binary");
    }
}
