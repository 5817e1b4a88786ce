//! Azure Computer Vision adapter.
//!
//! Calls the v3.2 `analyze` endpoint with raw image bytes and maps the
//! response onto the domain `ImageAnalysis`. Handles 429 rate limiting by
//! honoring the Retry-After header.

use crate::domain::{DomainError, ImageAnalysis, Tag};
use crate::ports::VisionPort;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Visual features requested from the analyze endpoint.
const VISUAL_FEATURES: &str = "Description,Tags,Categories,Objects";

/// Seconds to wait when the API rate limits us without a usable Retry-After.
const DEFAULT_RETRY_SECS: u64 = 5;

/// Azure Computer Vision adapter.
///
/// Works against any Computer Vision resource endpoint, e.g.
/// `https://<resource>.cognitiveservices.azure.com`.
pub struct AzureVisionAdapter {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    /// Optional delay before each request (rate limiting on free tiers).
    request_delay_ms: Option<u64>,
}

impl AzureVisionAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `endpoint` - Resource endpoint, with or without a trailing slash
    /// * `key` - Subscription key (sent as Ocp-Apim-Subscription-Key)
    /// * `request_delay_ms` - Optional pause before each call
    pub fn new(endpoint: String, key: String, request_delay_ms: Option<u64>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            key,
            request_delay_ms,
        }
    }

    /// Full analyze URL with the visual features query.
    fn analyze_url(&self) -> String {
        format!(
            "{}/vision/v3.2/analyze?visualFeatures={}",
            self.endpoint.trim_end_matches('/'),
            VISUAL_FEATURES
        )
    }
}

/// Wire structure of the analyze response. Sections we did not request (or
/// that the service omits for a particular image) default to empty.
#[derive(Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    description: DescriptionSection,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    categories: Vec<WireCategory>,
    #[serde(default)]
    objects: Vec<WireObject>,
}

#[derive(Deserialize, Default)]
struct DescriptionSection {
    #[serde(default)]
    captions: Vec<WireCaption>,
}

#[derive(Deserialize)]
struct WireCaption {
    text: String,
}

#[derive(Deserialize)]
struct WireTag {
    name: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct WireCategory {
    name: String,
    score: f64,
}

#[derive(Deserialize)]
struct WireObject {
    #[serde(rename = "object")]
    name: String,
    confidence: f64,
}

/// Convert the wire response to the domain entity.
///
/// The description is the first (highest-confidence) caption; the service
/// returns them best-first. No caption means an empty description.
fn to_domain(response: AnalyzeResponse) -> ImageAnalysis {
    let description = response
        .description
        .captions
        .into_iter()
        .next()
        .map(|c| c.text)
        .unwrap_or_default();

    ImageAnalysis {
        description,
        tags: response
            .tags
            .into_iter()
            .map(|t| Tag::new(t.name, t.confidence))
            .collect(),
        categories: response
            .categories
            .into_iter()
            .map(|c| Tag::new(c.name, c.score))
            .collect(),
        objects: response
            .objects
            .into_iter()
            .map(|o| Tag::new(o.name, o.confidence))
            .collect(),
    }
}

/// Parse the Retry-After header (delta seconds form).
fn retry_after_seconds(headers: &HeaderMap) -> u64 {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_SECS)
}

#[async_trait::async_trait]
impl VisionPort for AzureVisionAdapter {
    async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, DomainError> {
        if let Some(ms) = self.request_delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let url = self.analyze_url();
        info!(bytes = image.len(), "sending image to vision API");

        for attempt in 0..3 {
            let response = self
                .client
                .post(&url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .header("Content-Type", "application/octet-stream")
                .body(image.to_vec())
                .send()
                .await
                .map_err(|e| DomainError::Vision(format!("HTTP request failed: {}", e)))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = retry_after_seconds(response.headers());
                warn!(attempt, wait_secs, "vision API rate limited, sleeping");
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %text, "vision API returned error");
                return Err(DomainError::Vision(format!(
                    "API error {}: {}",
                    status,
                    text.chars().take(200).collect::<String>()
                )));
            }

            let parsed: AnalyzeResponse = response
                .json()
                .await
                .map_err(|e| DomainError::Vision(format!("Failed to parse API response: {}", e)))?;

            let analysis = to_domain(parsed);
            info!(
                tags = analysis.tags.len(),
                objects = analysis.objects.len(),
                has_caption = !analysis.description.is_empty(),
                "vision analysis received"
            );
            return Ok(analysis);
        }

        Err(DomainError::Vision("rate limit max retries".into()))
    }
}
