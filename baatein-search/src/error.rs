//! Error types for the baatein-search crate.
//!
//! Messages are stable and never contain request headers or cookies.

/// Errors that can occur during web search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The search request timed out.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// An HTTP request to the search engine failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse the search engine response HTML.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration or query.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for baatein-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
