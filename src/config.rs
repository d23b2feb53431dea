use crate::core::http::RetryPolicy;
use crate::core::perceptual::FingerprintAlgorithm;
use crate::core::urls::Allowlist;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "siteharvest/0.1 (+public-crawl)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid start URL {url:?}: {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("--max-pages must be at least 1")]
    ZeroMaxPages,
}

/// Thresholds applied to every decoded image before it becomes a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub min_bytes: usize,
    pub min_longest_side: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_bytes: 40 * 1024,
            min_longest_side: 600,
        }
    }
}

/// Validated settings for one harvesting run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: Url,
    pub max_pages: usize,
    pub max_depth: usize,
    pub rate_limit: Duration,
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub allowlist: Allowlist,
    pub user_agent: String,
    pub filter: FilterConfig,
    pub fingerprint: FingerprintAlgorithm,
    pub retry: RetryPolicy,
}

impl CrawlConfig {
    /// Validate the start URL and build a config with default limits.
    ///
    /// The start host is always part of the image allowlist.
    pub fn new(start_url: &str, output_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let start_url = parse_start_url(start_url)?;
        let allowlist = Allowlist::parse("", &start_url);

        Ok(Self {
            start_url,
            max_pages: 200,
            max_depth: 3,
            rate_limit: Duration::from_millis(800),
            timeout: Duration::from_secs(20),
            output_dir: output_dir.into(),
            allowlist,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            filter: FilterConfig::default(),
            fingerprint: FingerprintAlgorithm::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the allowlist with a comma-separated host list (plus the start host).
    pub fn with_allowed_domains(mut self, domains: &str) -> Self {
        self.allowlist = Allowlist::parse(domains, &self.start_url);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Result<Self, ConfigError> {
        if max_pages == 0 {
            return Err(ConfigError::ZeroMaxPages);
        }
        self.max_pages = max_pages;
        Ok(self)
    }

    /// Host of the start URL; only pages on this host are crawled.
    pub fn base_host(&self) -> &str {
        self.start_url.host_str().unwrap_or_default()
    }
}

fn parse_start_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::InvalidStartUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid("missing host")),
    }
}
