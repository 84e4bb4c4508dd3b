//! Token generation.
//!
//! The turn coordinator drives any [`TokenGenerator`]; [`ApiLlm`] is the
//! streaming chat-completions client used in production.

pub mod api;
pub mod sse;
pub mod think;

pub use api::ApiLlm;

use crate::conversation::ConversationMessage;
use futures_util::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Stream of generated text increments.
///
/// Ends at natural completion, on cancellation, or on any transport or
/// protocol failure (which is logged, never surfaced as an item).
pub type TokenStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Something that turns a conversation snapshot into streamed text.
pub trait TokenGenerator: Send + Sync {
    /// Start generating a reply to `messages`.
    ///
    /// Implementations must stop yielding promptly once `cancel` fires.
    fn stream(&self, messages: Vec<ConversationMessage>, cancel: CancellationToken) -> TokenStream;
}
