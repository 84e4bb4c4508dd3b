//! First-leg decision between answering directly and searching the web.
//!
//! The generation model signals a search by emitting the directive
//! `[SEARCH: <query>]` as its whole output. The decider watches the
//! accumulated text and commits to one outcome exactly once.

use crate::pipeline::segmenter::has_sentence_end;

/// Outcome of the first generation leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDecision {
    /// Not enough text yet to tell.
    Undecided,
    /// The model is answering; fragments may flow to synthesis.
    DirectAnswer,
    /// The model asked for a web search; nothing is spoken from this leg.
    SearchNeeded,
}

/// Watches accumulated first-leg output and fixes a [`SearchDecision`].
#[derive(Debug, Clone)]
pub struct SearchDecider {
    state: SearchDecision,
    lookahead_chars: usize,
    marker: String,
}

impl SearchDecider {
    pub fn new(lookahead_chars: usize, marker: impl Into<String>) -> Self {
        Self {
            state: SearchDecision::Undecided,
            lookahead_chars,
            marker: marker.into(),
        }
    }

    /// A decider already committed to a direct answer (second leg).
    pub fn direct() -> Self {
        Self {
            state: SearchDecision::DirectAnswer,
            lookahead_chars: 0,
            marker: String::new(),
        }
    }

    pub fn state(&self) -> SearchDecision {
        self.state
    }

    pub fn is_decided(&self) -> bool {
        self.state != SearchDecision::Undecided
    }

    /// Inspect the full text so far. Returns the decision on the call that
    /// makes it, `None` otherwise (including every call after deciding).
    pub fn observe(&mut self, accumulated: &str) -> Option<SearchDecision> {
        if self.is_decided() {
            return None;
        }
        if accumulated.contains(self.marker.as_str()) {
            self.state = SearchDecision::SearchNeeded;
            return Some(self.state);
        }
        if self.ends_with_partial_marker(accumulated) {
            return None;
        }
        if accumulated.chars().count() > self.lookahead_chars || has_sentence_end(accumulated) {
            self.state = SearchDecision::DirectAnswer;
            return Some(self.state);
        }
        None
    }

    /// Close the leg. An undecided stream counts as a direct answer.
    pub fn finish(&mut self, accumulated: &str) -> SearchDecision {
        if !self.is_decided() {
            self.state = if accumulated.contains(self.marker.as_str()) {
                SearchDecision::SearchNeeded
            } else {
                SearchDecision::DirectAnswer
            };
        }
        self.state
    }

    fn ends_with_partial_marker(&self, text: &str) -> bool {
        let text = text.trim_end();
        (1..self.marker.len())
            .filter(|&n| self.marker.is_char_boundary(n))
            .any(|n| text.ends_with(&self.marker[..n]))
    }
}

/// Pull the query out of a closed search directive.
///
/// The query runs from just after `open` to the first `close`, must stay on
/// one line, and is trimmed. Later directives are tried if an earlier one
/// is malformed.
pub fn extract_directive_query(text: &str, open: &str, close: &str) -> Option<String> {
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len()..];
        let end = after.find(close)?;
        let query = after[..end].trim();
        if !query.is_empty() && !query.contains('\n') {
            return Some(query.to_owned());
        }
        rest = after;
    }
    None
}

/// Query for a directive whose closing token never arrived: the rest of the
/// directive's line, trimmed. `None` when that is empty.
pub fn unclosed_directive_query(text: &str, open: &str) -> Option<String> {
    let start = text.find(open)?;
    let after = &text[start + open.len()..];
    let line = after.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_owned())
    }
}
