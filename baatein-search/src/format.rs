//! Text rendering of search hits for language-model consumption.

use crate::types::SearchResult;

/// Text returned when the engine produced no organic hits.
pub const NO_RESULTS: &str = "No results found.";

/// Render results as `- title: snippet` lines.
///
/// Returns [`NO_RESULTS`] for an empty slice so the caller always has
/// something to hand downstream.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_owned();
    }
    results
        .iter()
        .map(|r| format!("- {}: {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}
