//! Streaming chat-completions client.
//!
//! Speaks the OpenAI-compatible `POST /v1/chat/completions` protocol with
//! `stream: true`, authenticating with an `Api-Subscription-Key` header.

use crate::config::LlmConfig;
use crate::conversation::ConversationMessage;
use crate::error::{Result, SpeechError};
use crate::llm::sse::SseLineParser;
use crate::llm::think::ThinkTagStripper;
use crate::llm::{TokenGenerator, TokenStream};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Longest slice of an error body included in the log.
const ERROR_BODY_LOG_CHARS: usize = 500;

/// Header carrying the service subscription key.
pub const API_KEY_HEADER: &str = "api-subscription-key";

/// [`TokenGenerator`] backed by a remote chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ApiLlm {
    client: reqwest::Client,
    api_url: String,
    api_model: String,
    api_key: String,
    strip_think_tags: bool,
}

impl ApiLlm {
    /// Build a client with a pooled keep-alive connection set.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_connections)
            .build()
            .map_err(|e| SpeechError::Llm(format!("failed to build HTTP client: {e}")))?;

        info!(url = %config.api_url, model = %config.api_model, "generation client configured");

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_model: config.api_model.clone(),
            api_key: config.api_key.clone(),
            strip_think_tags: config.strip_think_tags,
        })
    }

    fn request_body(&self, messages: &[ConversationMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.api_model,
            "messages": messages,
            "stream": true,
        })
    }
}

impl TokenGenerator for ApiLlm {
    fn stream(&self, messages: Vec<ConversationMessage>, cancel: CancellationToken) -> TokenStream {
        let request = self
            .client
            .post(&self.api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&self.request_body(&messages));
        let strip_think_tags = self.strip_think_tags;

        Box::pin(async_stream::stream! {
            let started = Instant::now();
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                response = request.send() => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!("generation request failed: {e}");
                    return;
                }
            };

            let status = response.status();
            debug!(%status, elapsed = started.elapsed().as_secs_f64(), "generation response");
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let body: String = body.chars().take(ERROR_BODY_LOG_CHARS).collect();
                warn!(%status, %body, "generation API error");
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut parser = SseLineParser::new();
            let mut stripper = strip_think_tags.then(ThinkTagStripper::new);
            let mut done = false;

            while !done {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("generation cancelled");
                        return;
                    }
                    next = bytes.next() => next,
                };
                let events = match next {
                    Some(Ok(chunk)) => parser.push(&chunk),
                    Some(Err(e)) => {
                        warn!("generation stream error: {e}");
                        break;
                    }
                    None => {
                        done = true;
                        parser.flush().into_iter().collect()
                    }
                };
                for event in events {
                    if event.is_done() {
                        done = true;
                        break;
                    }
                    let Some(content) = delta_content(&event.data) else {
                        continue;
                    };
                    let visible = match stripper.as_mut() {
                        Some(stripper) => stripper.push(&content),
                        None => content,
                    };
                    if !visible.is_empty() {
                        yield visible;
                    }
                }
            }

            if let Some(tail) = stripper.as_mut().map(ThinkTagStripper::finish)
                && !tail.is_empty()
                && !cancel.is_cancelled()
            {
                yield tail;
            }
            debug!(elapsed = started.elapsed().as_secs_f64(), "generation stream finished");
        })
    }
}

/// Text of `choices[0].delta.content`, if present and non-empty.
///
/// Malformed increments are skipped.
fn delta_content(data: &str) -> Option<String> {
    let chunk: serde_json::Value = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!("skipping unparsable increment: {e}");
            return None;
        }
    };
    chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
