//! Web search collaborator and utterance query heuristics.

use crate::config::SearchSettings;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Filler words and phrases dropped from a raw utterance before it is used
/// as a search query. Matched case-insensitively after trimming `.,!?`.
pub const FILLER_WORDS: &[&str] = &[
    "hmm",
    "hm",
    "um",
    "uh",
    "ah",
    "okay",
    "ok",
    "like",
    "yeah",
    "yes",
    "no",
    "right",
    "so",
    "well",
    "actually",
    "basically",
    "you know",
    "i mean",
    "let me think",
    "wait",
    "hold on",
    // Malayalam
    "alla",
    "adu",
    "ennu",
    "aanu",
    "super",
];

/// Cleaned queries shorter than this fall back to the raw utterance.
const MIN_QUERY_CHARS: usize = 5;

/// Something that can turn a query into a short textual digest of results.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a search and return the formatted result summary.
    async fn search(&self, query: &str) -> Result<String>;
}

/// [`SearchBackend`] over the embedded DuckDuckGo scraper.
#[derive(Debug, Clone, Default)]
pub struct WebSearch {
    config: baatein_search::SearchConfig,
}

impl WebSearch {
    pub fn new(settings: &SearchSettings) -> Self {
        Self {
            config: settings.to_search_config(),
        }
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    async fn search(&self, query: &str) -> Result<String> {
        debug!(query, "web search");
        Ok(baatein_search::search_summary(query, &self.config).await?)
    }
}

/// Run a search, turning any failure into result text so the grounded leg
/// can still acknowledge the missing data.
pub async fn search_or_error_text(backend: &dyn SearchBackend, query: &str) -> String {
    match backend.search(query).await {
        Ok(results) => results,
        Err(e) => {
            warn!(query, "search failed: {e}");
            format!("Search error: {e}")
        }
    }
}

/// Strip fillers from an utterance to get a search query.
///
/// Multi-word fillers are matched as consecutive words. If fewer than five
/// characters survive, the trimmed utterance is returned unchanged.
pub fn clean_for_search(utterance: &str) -> String {
    let words: Vec<&str> = utterance.split_whitespace().collect();
    let normalised: Vec<String> = words
        .iter()
        .map(|w| w.to_lowercase().trim_matches(['.', ',', '!', '?']).to_owned())
        .collect();

    let mut kept = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        match filler_len_at(&normalised[i..]) {
            Some(len) => i += len,
            None => {
                kept.push(words[i]);
                i += 1;
            }
        }
    }

    let cleaned = kept.join(" ");
    if cleaned.chars().count() < MIN_QUERY_CHARS {
        utterance.trim().to_owned()
    } else {
        cleaned
    }
}

/// Length in words of the longest filler starting at `words[0]`.
fn filler_len_at(words: &[String]) -> Option<usize> {
    FILLER_WORDS
        .iter()
        .filter_map(|filler| {
            let parts: Vec<&str> = filler.split(' ').collect();
            let matches = parts.len() <= words.len()
                && parts.iter().zip(words).all(|(p, w)| *p == w.as_str());
            matches.then_some(parts.len())
        })
        .max()
}

/// Jaccard ratio of the lowercase whitespace-separated word sets.
///
/// Returns `0.0` when either side has no words.
pub fn query_similarity(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f64 / union as f64
}
