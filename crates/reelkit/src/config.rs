//! Scraper configuration.
//!
//! Every tunable of the scraper lives here so a front end can load it from a
//! file and hand it to [`crate::Scraper`]. Durations are stored as integer
//! milliseconds to keep the serialized form readable.

use std::time::Duration;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Placeholder origin used when no site is configured.
pub const DEFAULT_ORIGIN: &str = "https://example.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Site origin, e.g. `https://example.com`. Relative hrefs are resolved against it.
    pub origin: String,
    /// Landing page path; `{subject}` is replaced with the subject identifier.
    pub landing_path: String,
    /// Pattern the listing component's declared name must match.
    pub component_pattern: String,
    /// Path prefix of the protocol endpoint; the component name is appended.
    pub message_path: String,
    /// Method invoked on the component to load the next batch.
    pub load_method: String,
    /// Path fragment every record anchor must contain.
    pub card_path_marker: String,
    /// Records per listing page.
    pub page_size: u32,
    pub request_timeout_ms: u64,
    /// Upper bound of the random delay before a landing-page fetch.
    pub init_jitter_ms: u64,
    /// Retries after a session-invalidation signal (not counting the first attempt).
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub retry_backoff_ms: u64,
    /// Statuses on a protocol request that mean the session or token is no longer usable.
    pub session_expired_statuses: Vec<u16>,
    /// Cookies used on first contact for any key the landing page did not set.
    pub global_cookies: FxHashMap<String, String>,
    /// Host fragments of embed hosts whose player config is packed.
    pub obfuscated_hosts: Vec<String>,
    /// Keywords an iframe `src` must contain to count as an embed.
    pub embed_keywords: Vec<String>,
    /// Name of the hidden input holding a fallback poster.
    pub poster_input_name: String,
    /// TTL of cached page results, in seconds.
    pub page_cache_ttl_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            landing_path: "/{subject}".to_string(),
            component_pattern: r"(?i)(video|media|listing|feed)".to_string(),
            message_path: "/livewire/message/".to_string(),
            load_method: "loadMore".to_string(),
            card_path_marker: "/watch/".to_string(),
            page_size: 20,
            request_timeout_ms: 30_000,
            init_jitter_ms: 500,
            max_retries: 2,
            retry_backoff_ms: 1_000,
            session_expired_statuses: vec![401, 403, 419, 429],
            global_cookies: FxHashMap::default(),
            obfuscated_hosts: [
                "filemoon",
                "streamwish",
                "wishembed",
                "vidhide",
                "filelions",
                "streamhide",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            embed_keywords: ["embed", "player", "video", "stream", "/e/", "/v/"]
                .into_iter()
                .map(String::from)
                .collect(),
            poster_input_name: "thumbnail".to_string(),
            page_cache_ttl_secs: 300,
        }
    }
}

impl ScraperConfig {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Origin without a trailing slash.
    pub fn origin(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    pub fn landing_url(&self, subject: &str) -> String {
        let path = self.landing_path.replace("{subject}", subject);
        format!("{}{}", self.origin(), ensure_leading_slash(&path))
    }

    pub fn message_url(&self, component_name: &str) -> String {
        let prefix = ensure_leading_slash(&self.message_path);
        let prefix = prefix.trim_end_matches('/');
        format!("{}{}/{}", self.origin(), prefix, component_name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn init_jitter(&self) -> Duration {
        Duration::from_millis(self.init_jitter_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.page_cache_ttl_secs)
    }

    pub fn is_session_expired_status(&self, status: u16) -> bool {
        self.session_expired_statuses.contains(&status)
    }

    pub fn component_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.component_pattern)?)
    }

    /// Checks the values the pipeline cannot run without.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ScrapeError::Config(format!("invalid origin {}: {e}", self.origin)))?;
        if parsed.host_str().is_none() {
            return Err(ScrapeError::Config(format!(
                "origin {} has no host",
                self.origin
            )));
        }
        if self.page_size == 0 {
            return Err(ScrapeError::Config("page_size must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ScrapeError::Config(
                "request_timeout_ms must be positive".into(),
            ));
        }
        if !self.landing_path.contains("{subject}") {
            return Err(ScrapeError::Config(
                "landing_path must contain {subject}".into(),
            ));
        }
        self.component_regex()?;
        Ok(())
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
