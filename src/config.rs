use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::retry::RetryPolicy;

/// Default number of posts per feed page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars, never from code. The .env file is loaded
/// at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local SQLite file: the demo/offline store and client prefs.
    pub db_path: String,
    /// Hosted backend base URL (e.g. https://xyz.example.co). Empty means
    /// local-only mode.
    pub api_url: String,
    /// Public (anon) API key sent with every hosted request.
    pub anon_key: String,
    pub page_size: usize,
    /// Budget for the startup session check.
    pub session_retry: RetryPolicy,
    /// Budget for the first feed fetch.
    pub feed_retry: RetryPolicy,
    /// Quiet period after a like toggle settles before the post accepts
    /// another toggle.
    pub like_quiescence: Duration,
    /// How often the hosted adapter polls for new posts to feed `watch`.
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; the hosted backend is only required by
    /// commands that talk to it.
    pub fn load() -> Result<Self> {
        let attempts = env_u64("YALLWALL_RETRY_ATTEMPTS", 3)? as u32;
        let backoff = Duration::from_millis(env_u64("YALLWALL_RETRY_BACKOFF_MS", 500)?);

        Ok(Self {
            db_path: env::var("YALLWALL_DB_PATH").unwrap_or_else(|_| default_db_path()),
            api_url: env::var("YALLWALL_API_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            anon_key: env::var("YALLWALL_ANON_KEY").unwrap_or_default(),
            page_size: env_u64("YALLWALL_PAGE_SIZE", DEFAULT_PAGE_SIZE as u64)?.max(1) as usize,
            session_retry: RetryPolicy {
                timeout: Duration::from_millis(env_u64("YALLWALL_SESSION_TIMEOUT_MS", 3000)?),
                attempts,
                backoff,
            },
            feed_retry: RetryPolicy {
                timeout: Duration::from_millis(env_u64("YALLWALL_FEED_TIMEOUT_MS", 5000)?),
                attempts,
                backoff,
            },
            like_quiescence: Duration::from_millis(env_u64("YALLWALL_LIKE_QUIESCENCE_MS", 500)?),
            poll_interval: Duration::from_secs(env_u64("YALLWALL_POLL_INTERVAL_SECS", 15)?.max(1)),
        })
    }

    /// True when a hosted backend is configured.
    pub fn has_hosted_backend(&self) -> bool {
        !self.api_url.is_empty()
    }

    /// Check that the hosted backend is configured.
    /// Call this before any operation that needs the hosted API.
    pub fn require_hosted(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!(
                "YALLWALL_API_URL not set. Add it to your .env file, \
                 or run `yallwall demo on` to use the local store."
            );
        }
        if self.anon_key.is_empty() {
            anyhow::bail!("YALLWALL_ANON_KEY not set. Add it to your .env file.");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api_url: String::new(),
            anon_key: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            session_retry: RetryPolicy::session_check(),
            feed_retry: RetryPolicy::feed_fetch(),
            like_quiescence: Duration::from_millis(500),
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// `<data dir>/yallwall/yallwall.db`, or `./yallwall.db` when the platform
/// has no data directory.
pub fn default_db_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("yallwall").join("yallwall.db"))
        .unwrap_or_else(|| PathBuf::from("./yallwall.db"))
        .to_string_lossy()
        .into_owned()
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer, got {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_budgets() {
        let config = Config::default();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.session_retry.timeout, Duration::from_secs(3));
        assert_eq!(config.feed_retry.timeout, Duration::from_secs(5));
        assert_eq!(config.session_retry.attempts, 3);
        assert_eq!(config.like_quiescence, Duration::from_millis(500));
        assert!(!config.has_hosted_backend());
    }

    #[test]
    fn test_require_hosted_without_url_fails() {
        let config = Config::default();
        assert!(config.require_hosted().is_err());
    }

    #[test]
    fn test_default_db_path_ends_with_file_name() {
        assert!(default_db_path().ends_with("yallwall.db"));
    }
}
