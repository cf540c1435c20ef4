use crate::error::SessionError;
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_BASE_URL: &str = "CODEDOC_API_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "CODEDOC_API_TIMEOUT_SECS";

const API_PREFIX: &[&str] = &["api", "repo"];

/// Where the analysis service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("codedoc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn parse_base_url(value: &str) -> Result<Url, SessionError> {
    let url = Url::parse(value.trim())
        .map_err(|error| SessionError::config(format!("invalid base URL {value:?}: {error}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SessionError::config(format!(
            "base URL must use http or https, got {other}"
        ))),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, SessionError> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|_| SessionError::config(format!("invalid timeout {value:?}")))?;
    if secs == 0 {
        return Err(SessionError::config("timeout must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_BASE_URL).filter(|value| !value.trim().is_empty()) {
            config.base_url = parse_base_url(&value)?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS).filter(|value| !value.trim().is_empty()) {
            config.timeout = parse_timeout(&value)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, SessionError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `<base>/api/repo/<segments...>`. Segments are percent-encoded,
    /// so a repository name always stays a single path segment.
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SessionError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SessionError::config(format!("base URL {} cannot carry a path", self.base_url)))?;
            path.pop_if_empty();
            path.extend(API_PREFIX.iter().chain(segments.iter()));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }
}
