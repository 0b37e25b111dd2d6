use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Connection settings shared by the API client and the stream runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Base URL of the backend API (no trailing slash).
    pub api_url: String,

    /// Base URL the deployed previews are served from.
    pub preview_url: String,

    /// How long a stream may stay silent before it is treated as dropped.
    /// The backend pings every 15s, so the default leaves room for two misses.
    #[serde(with = "secs")]
    pub idle_timeout: Duration,

    /// Timeout for plain (non-stream) requests.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            preview_url: "http://localhost:8000".into(),
            idle_timeout: Duration::from_secs(45),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl StudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `STUDIO_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("STUDIO_API_URL") {
            config = config.with_api_url(url);
        }
        if let Some(url) = lookup("STUDIO_PREVIEW_URL") {
            config = config.with_preview_url(url);
        }
        if let Some(raw) = lookup("STUDIO_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = parse_secs("STUDIO_IDLE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("STUDIO_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("STUDIO_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL for an API path such as `/graphs/page`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| StudioError::Config(format!("{key} must be a whole number of seconds, got '{raw}'")))
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
