//! Core result type.

use serde::{Deserialize, Serialize};

/// A single organic hit from the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result page.
    pub title: String,
    /// The destination URL, with engine redirect wrappers removed.
    pub url: String,
    /// A short text snippet summarising the page.
    pub snippet: String,
}
