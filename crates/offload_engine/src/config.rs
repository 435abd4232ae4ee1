use std::time::Duration;

use offload_core::PollPolicy;
use url::Url;

/// Production processing service.
pub const DEFAULT_BASE_URL: &str = "https://api.offloadtools.app/v1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid service base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Everything a job client needs to know about the remote service.
///
/// Built once by the caller and injected; protocol code never reads the
/// environment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on a downloaded artifact.
    pub max_download_bytes: u64,
    pub poll: PollPolicy,
    /// Wall-clock budget for one whole job; `None` waits for a terminal status.
    pub max_wait: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_download_bytes: 200 * 1024 * 1024,
            poll: PollPolicy::default(),
            max_wait: None,
        }
    }
}

impl ServiceConfig {
    /// Default settings against `base_url`, validated up front.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            base_url: base_url.into(),
            ..Self::default()
        };
        config.parsed_base_url()?;
        Ok(config)
    }

    pub(crate) fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(self.base_url.trim()).map_err(|err| invalid(err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("url cannot carry a path".to_string()));
        }
        Ok(url)
    }
}
