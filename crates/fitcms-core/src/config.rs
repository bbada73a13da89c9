//! Configuration module
//!
//! Client-side settings for the exercise media toolkit: API location and
//! credentials, request concurrency, cache freshness, retry schedule,
//! refresh debounce and per-type upload ceilings.

use std::env;
use std::time::Duration;

use crate::models::MediaType;

// Common constants
const API_URL: &str = "http://localhost:3000";
const API_PREFIX: &str = "/api";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_CONCURRENT_REQUESTS: usize = 2;
const CACHE_TTL_SECS: u64 = 30;
const RETRY_MAX: u32 = 3;
const RETRY_INITIAL_DELAY_MS: u64 = 1000;
const RETRY_MAX_JITTER_MS: u64 = 500;
const REFRESH_DEBOUNCE_MS: u64 = 300;
const MAX_IMAGE_SIZE_MB: usize = 10;
const MAX_VIDEO_SIZE_MB: usize = 200;
const MAX_SVG_SIZE_MB: usize = 2;

const MB: usize = 1024 * 1024;

/// Per-type upload size ceilings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub max_video_bytes: usize,
    pub max_svg_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: MAX_IMAGE_SIZE_MB * MB,
            max_video_bytes: MAX_VIDEO_SIZE_MB * MB,
            max_svg_bytes: MAX_SVG_SIZE_MB * MB,
        }
    }
}

impl UploadLimits {
    pub fn max_bytes(&self, media_type: MediaType) -> usize {
        match media_type {
            MediaType::Image => self.max_image_bytes,
            MediaType::Video => self.max_video_bytes,
            MediaType::Svg => self.max_svg_bytes,
        }
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_prefix: String,
    /// Sent as `Authorization: Bearer {token}`; takes precedence over `api_key`.
    pub api_token: Option<String>,
    /// Sent as `X-API-Key: {key}`.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub cache_ttl_secs: u64,
    pub retry_max: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_jitter_ms: u64,
    pub refresh_debounce_ms: u64,
    pub upload_limits: UploadLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            api_prefix: API_PREFIX.to_string(),
            api_token: None,
            api_key: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
            cache_ttl_secs: CACHE_TTL_SECS,
            retry_max: RETRY_MAX,
            retry_initial_delay_ms: RETRY_INITIAL_DELAY_MS,
            retry_max_jitter_ms: RETRY_MAX_JITTER_MS,
            refresh_debounce_ms: REFRESH_DEBOUNCE_MS,
            upload_limits: UploadLimits::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("FITCMS_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| API_URL.to_string());

        let config = ClientConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_prefix: env::var("FITCMS_API_PREFIX").unwrap_or_else(|_| API_PREFIX.to_string()),
            api_token: env_non_empty("FITCMS_API_TOKEN"),
            api_key: env_non_empty("FITCMS_API_KEY"),
            request_timeout_secs: env_parse("FITCMS_REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS),
            max_concurrent_requests: env_parse(
                "FITCMS_MAX_CONCURRENT_REQUESTS",
                MAX_CONCURRENT_REQUESTS,
            ),
            cache_ttl_secs: env_parse("FITCMS_CACHE_TTL_SECS", CACHE_TTL_SECS),
            retry_max: env_parse("FITCMS_RETRY_MAX", RETRY_MAX),
            retry_initial_delay_ms: env_parse(
                "FITCMS_RETRY_INITIAL_DELAY_MS",
                RETRY_INITIAL_DELAY_MS,
            ),
            retry_max_jitter_ms: env_parse("FITCMS_RETRY_MAX_JITTER_MS", RETRY_MAX_JITTER_MS),
            refresh_debounce_ms: env_parse("FITCMS_REFRESH_DEBOUNCE_MS", REFRESH_DEBOUNCE_MS),
            upload_limits: UploadLimits {
                max_image_bytes: env_parse("FITCMS_MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB) * MB,
                max_video_bytes: env_parse("FITCMS_MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB) * MB,
                max_svg_bytes: env_parse("FITCMS_MAX_SVG_SIZE_MB", MAX_SVG_SIZE_MB) * MB,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "FITCMS_API_URL must be an http(s) URL, got {}",
                self.api_url
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!(
                "FITCMS_MAX_CONCURRENT_REQUESTS must be at least 1"
            ));
        }

        if self.api_token.is_none() && self.api_key.is_none() {
            return Err(anyhow::anyhow!(
                "Missing credentials. Set FITCMS_API_TOKEN or FITCMS_API_KEY"
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn retry_max_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_max_jitter_ms)
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}
