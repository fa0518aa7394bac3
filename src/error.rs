// src/error.rs
// =============================================================================
// Error types for the library.
//
// A broken image is NOT an error here: it is a normal outcome reported as
// `loaded = false`. The errors below only cover setup problems around the
// checker (bad selectors, bad URLs, an HTTP client that cannot be built,
// pages that cannot be fetched).
//
// Rust concepts:
// - thiserror: Derives std::error::Error and Display from attributes
// - #[source]: Keeps the underlying error available for error chains
// =============================================================================

/// Errors raised while preparing or driving a check.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The CSS selector used to pick subtree roots could not be parsed
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A base or page URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client behind the loader could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A page could not be downloaded
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A page answered with a non-success status
    #[error("failed to fetch {url}: HTTP {status}")]
    PageStatus { url: String, status: u16 },

    /// A context was created outside a tokio runtime
    #[error("no tokio runtime available to run checks on")]
    NoRuntime,

    /// The run's event channel closed before the completion event arrived
    #[error("check run ended before completion")]
    RunInterrupted,
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, CheckError>;
