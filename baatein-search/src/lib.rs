//! # baatein-search
//!
//! Embedded web search for the Baatein voice agent.
//!
//! Scrapes the HTML-only DuckDuckGo endpoint directly, so there are no API
//! keys to provision. The voice pipeline only ever needs a short textual
//! digest of the top hits, which [`search_summary`] produces.
//!
//! ## Security
//!
//! - No API keys or secrets to leak
//! - Search queries are logged only at trace level
//! - Result snippets are whitespace-normalised before returning

pub mod config;
pub mod duckduckgo;
pub mod error;
pub mod format;
pub mod http;
pub mod types;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use format::format_results;
pub use types::SearchResult;

/// Search the web and return up to `config.max_results` ranked results.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid configuration, or
/// [`SearchError::Http`] / [`SearchError::Parse`] if the engine request fails.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> baatein_search::Result<()> {
/// let config = baatein_search::SearchConfig::default();
/// let results = baatein_search::search("mumbai weather today", &config).await?;
/// for result in &results {
///     println!("{}: {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(query: &str, config: &SearchConfig) -> Result<Vec<SearchResult>> {
    config.validate()?;
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::Config("query must not be empty".into()));
    }
    duckduckgo::search(query, config).await
}

/// Search the web and render the hits as a compact text digest suitable for
/// feeding back into a language model.
///
/// # Errors
///
/// Same as [`search`].
pub async fn search_summary(query: &str, config: &SearchConfig) -> Result<String> {
    let results = search(query, config).await?;
    Ok(format_results(&results))
}
