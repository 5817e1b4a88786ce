//! Application configuration. API credentials, paths, limits.

use serde::Deserialize;

/// Default upload size cap (4 MiB). Matches the vision API's own request
/// limit on the free tier, so oversized files fail here instead of remotely.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub data_dir: Option<String>,
    pub session_path: Option<String>,

    /// Largest accepted upload in bytes. Read from IMG_LENS_MAX_IMAGE_BYTES.
    #[serde(default)]
    pub max_image_bytes: Option<usize>,

    /// bcrypt work factor for new password hashes. Read from IMG_LENS_BCRYPT_COST.
    #[serde(default)]
    pub bcrypt_cost: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Vision API Configuration
    // ─────────────────────────────────────────────────────────────────────────
    /// Azure Computer Vision subscription key. Read from IMG_LENS_VISION_KEY.
    #[serde(default)]
    pub vision_key: Option<String>,

    /// Azure Computer Vision resource endpoint. Read from IMG_LENS_VISION_ENDPOINT.
    #[serde(default)]
    pub vision_endpoint: Option<String>,

    /// Optional delay in ms before each vision request (rate limiting on free tiers). Read from VISION_DELAY_MS.
    #[serde(default)]
    pub vision_delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("IMG_LENS"));
        if let Ok(path) = std::env::var("IMG_LENS_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // VISION_DELAY_MS is read directly (no IMG_LENS_ prefix) so .env can use VISION_DELAY_MS=200
        if let Ok(s) = std::env::var("VISION_DELAY_MS") {
            if let Ok(ms) = s.parse::<u64>() {
                cfg.vision_delay_ms = Some(ms);
            }
        }
        Ok(cfg)
    }

    /// Returns the largest accepted upload in bytes. Defaults to DEFAULT_MAX_IMAGE_BYTES.
    pub fn max_image_bytes_or_default(&self) -> usize {
        self.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES)
    }

    /// Returns the bcrypt work factor. Defaults to bcrypt::DEFAULT_COST.
    pub fn bcrypt_cost_or_default(&self) -> u32 {
        self.bcrypt_cost.unwrap_or(bcrypt::DEFAULT_COST)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Vision Configuration Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the vision key if configured. Reads from config (IMG_LENS_VISION_KEY)
    /// or the unprefixed AZURE_COMPUTER_VISION_KEY env.
    pub fn vision_key(&self) -> Option<String> {
        self.vision_key
            .clone()
            .or_else(|| std::env::var("AZURE_COMPUTER_VISION_KEY").ok())
    }

    /// Returns the vision endpoint from config (IMG_LENS_VISION_ENDPOINT)
    /// or the unprefixed AZURE_COMPUTER_VISION_ENDPOINT env.
    pub fn vision_endpoint(&self) -> Option<String> {
        self.vision_endpoint
            .clone()
            .or_else(|| std::env::var("AZURE_COMPUTER_VISION_ENDPOINT").ok())
    }

    /// Returns true if the vision API is fully configured (key and endpoint present).
    pub fn is_vision_configured(&self) -> bool {
        self.vision_key().is_some() && self.vision_endpoint().is_some()
    }
}
