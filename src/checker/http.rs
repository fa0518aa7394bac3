// src/checker/http.rs
// =============================================================================
// The real ResourceLoader: fetches image sources over HTTP.
//
// For every source a probe cannot settle on its own, HttpLoader sends a GET
// request and reports:
// - true  for 2xx responses
// - false for everything else: error statuses, timeouts, DNS and TLS
//   failures, redirect loops, relative or unsupported URLs
//
// Inline `data:` URLs never touch the network: they are loaded when they
// are well formed (a `data:` prefix and a comma before the payload).
//
// Why GET and not HEAD?
// - Loading an image means downloading it; some servers answer HEAD
//   differently from GET (405, or 200 for images that would 404)
// =============================================================================

use futures::future::{self, BoxFuture, FutureExt};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::loader::ResourceLoader;
use crate::error::{CheckError, Result};

/// Settings for the HTTP client behind the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Per-request timeout; a timed out fetch counts as broken
    pub timeout: Duration,
    /// Redirects followed before giving up
    pub max_redirects: usize,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 5,
            user_agent: format!("things-loaded/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Loads resources with a shared reqwest client (connection pooling)
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(CheckError::Client)?;

        Ok(Self { client })
    }

    /// The underlying client, e.g. to fetch the pages images come from
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl ResourceLoader for HttpLoader {
    fn load(&self, source: &str) -> BoxFuture<'static, bool> {
        if let Some(loaded) = inline_data_outcome(source) {
            debug!(source, loaded, "inline data URL");
            return future::ready(loaded).boxed();
        }

        let client = self.client.clone();
        let source = source.to_string();
        async move { fetch_resource(&client, &source).await }.boxed()
    }
}

async fn fetch_resource(client: &Client, source: &str) -> bool {
    match client.get(source).send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                debug!(source, status = status.as_u16(), "resource answered with error status");
            }
            status.is_success()
        }
        Err(error) => {
            debug!(source, reason = failure_reason(&error), "resource failed to load");
            false
        }
    }
}

// Puts a transport error into a bucket for the logs. Every bucket is the
// same "broken" outcome for the checker.
fn failure_reason(error: &reqwest::Error) -> &'static str {
    let text = error.to_string().to_lowercase();

    if error.is_builder() {
        "invalid or unsupported URL"
    } else if error.is_timeout() {
        "request timed out"
    } else if error.is_redirect() {
        "too many redirects"
    } else if error.is_connect() && text.contains("dns") {
        "could not resolve hostname"
    } else if error.is_connect() {
        "connection failed"
    } else if text.contains("certificate") || text.contains("ssl") || text.contains("tls") {
        "TLS error"
    } else {
        "request failed"
    }
}

// `Some(outcome)` for data: URLs, `None` for anything that needs fetching
fn inline_data_outcome(source: &str) -> Option<bool> {
    let scheme = source.get(..5)?;
    if !scheme.eq_ignore_ascii_case("data:") {
        return None;
    }
    Some(source[5..].contains(','))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> HttpLoader {
        HttpLoader::new(&LoaderConfig::default()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_redirects, 5);
        assert!(config.user_agent.starts_with("things-loaded/"));
    }

    #[test]
    fn test_inline_data_detection() {
        assert_eq!(inline_data_outcome("data:image/png;base64,AAAA"), Some(true));
        assert_eq!(inline_data_outcome("DATA:,"), Some(true));
        assert_eq!(inline_data_outcome("data:image/png"), Some(false));
        assert_eq!(inline_data_outcome("https://example.com/a.png"), None);
        assert_eq!(inline_data_outcome("a.png"), None);
    }

    #[tokio::test]
    async fn test_data_url_loads_without_network() {
        assert!(loader().load("data:image/gif;base64,R0lGODlhAQABAAAAACw=").await);
        assert!(!loader().load("data:nothing-here").await);
    }

    #[tokio::test]
    async fn test_relative_source_is_broken() {
        // reqwest refuses URLs without a scheme before any I/O happens
        assert!(!loader().load("images/relative.png").await);
    }
}
