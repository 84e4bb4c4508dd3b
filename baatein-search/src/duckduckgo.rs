//! DuckDuckGo HTML scraper.
//!
//! Posts the query form to the HTML-only endpoint, which needs no
//! JavaScript and tolerates automated requests.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::types::SearchResult;
use scraper::{Html, Selector};
use url::Url;

/// Run one query against the configured endpoint.
///
/// # Errors
///
/// Returns [`SearchError::Timeout`] when the request exceeds the configured
/// timeout, [`SearchError::Http`] for any other transport or status failure,
/// and [`SearchError::Parse`] if the page cannot be parsed.
pub async fn search(query: &str, config: &SearchConfig) -> Result<Vec<SearchResult>, SearchError> {
    tracing::trace!(query, "DuckDuckGo search");

    let client = http::build_client(config)?;

    let mut params = vec![("q", query)];
    if config.safe_search {
        params.push(("kp", "1"));
    }

    let response = client
        .post(&config.endpoint)
        .form(&params)
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout(format!(
                    "DuckDuckGo request exceeded {}s",
                    config.timeout_seconds
                ))
            } else {
                SearchError::Http(format!("DuckDuckGo request failed: {e}"))
            }
        })?
        .error_for_status()
        .map_err(|e| SearchError::Http(format!("DuckDuckGo HTTP error: {e}")))?;

    let html = response
        .text()
        .await
        .map_err(|e| SearchError::Http(format!("DuckDuckGo response read failed: {e}")))?;

    tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

    parse_results(&html, config.max_results)
}

/// Unwrap DuckDuckGo's `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn extract_url(href: &str) -> Option<String> {
    let full_href = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&full_href).ok()?;

    if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
    } else {
        Some(full_href)
    }
}

/// Collapse runs of whitespace left over from the HTML layout.
fn normalise_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a results page. Ads are skipped.
pub(crate) fn parse_results(
    html: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = normalise_text(&title_el.text().collect::<String>());
        if title.is_empty() {
            continue;
        }

        let Some(url) = title_el.value().attr("href").and_then(extract_url) else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| normalise_text(&el.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url,
            snippet,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}
