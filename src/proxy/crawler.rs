//! Subscription source crawler
//!
//! This module provides functionality for:
//! - Fetching raw subscription bodies from remote sources
//! - Decoding base64-wrapped subscription bodies
//! - Merging descriptor lines from all sources into one deduplicated set

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = concat!("subprobe/", env!("CARGO_PKG_VERSION"));

/// Base used for locators given as `owner/repo/branch/path`
pub const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com/";

/// A body made only of base64 alphabet characters (whitespace already removed)
static BASE64_BODY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("Invalid base64 body regex")
});

/// Errors that can occur while fetching a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error fetching {0}: {1}")]
    Http(String, #[source] reqwest::Error),
    #[error("{0} answered with status {1}")]
    Status(String, reqwest::StatusCode),
}

/// Result of crawling a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The URL that was fetched
    pub source: String,
    /// Number of non-empty lines the source contributed
    pub lines: usize,
    /// Error message if fetching failed
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn success(source: String, lines: usize) -> Self {
        Self {
            source,
            lines,
            error: None,
        }
    }

    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            lines: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for the source crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Crawler that turns source locators into a descriptor set
pub struct SourceCrawler {
    client: Client,
}

impl SourceCrawler {
    /// Create a new crawler with default configuration
    pub fn new() -> crate::Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch one source and return its body, decoded when it is base64
    pub async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Http(url.to_string(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(url.to_string(), status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(url.to_string(), e))?;
        Ok(decode_body(&body))
    }

    /// Fetch every locator and merge their lines
    ///
    /// Failing sources are logged and skipped.
    pub async fn crawl_all(&self, locators: &[String]) -> (BTreeSet<String>, Vec<CrawlResult>) {
        let mut descriptors = BTreeSet::new();
        let mut results = Vec::new();

        for locator in locators {
            let url = resolve_locator(locator);
            let result = match self.fetch(&url).await {
                Ok(body) => {
                    let lines = merge_lines(&body, &mut descriptors);
                    info!(source = %url, lines, "fetched source");
                    CrawlResult::success(url, lines)
                }
                Err(e) => {
                    warn!(source = %url, error = %e, "failed to fetch source");
                    CrawlResult::failure(url, e.to_string())
                }
            };
            results.push(result);
        }

        (descriptors, results)
    }
}

/// Turn a configured locator into a fetchable URL
pub fn resolve_locator(locator: &str) -> String {
    let locator = locator.trim();
    if locator.starts_with("http://") || locator.starts_with("https://") {
        locator.to_string()
    } else {
        format!("{}{}", GITHUB_RAW_BASE, locator.trim_start_matches('/'))
    }
}

/// Decode a base64 subscription body, or return it unchanged
///
/// The body is treated as base64 only when, with whitespace removed, it uses
/// the standard alphabet, decodes once padded to a multiple of four, and the
/// decoded bytes are UTF-8.
pub fn decode_body(body: &str) -> String {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() || !BASE64_BODY_REGEX.is_match(&compact) {
        return body.to_string();
    }

    let mut padded = compact;
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    general_purpose::STANDARD
        .decode(padded.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| body.to_string())
}

/// Add every non-blank line of `body` to `set`, returning how many lines were seen
pub fn merge_lines(body: &str, set: &mut BTreeSet<String>) -> usize {
    let mut count = 0;
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        set.insert(line.to_string());
        count += 1;
    }
    count
}
