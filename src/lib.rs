//! Baatein: low-latency spoken conversation agent.
//!
//! A browser streams microphone audio over a websocket; the server relays it
//! to streaming speech recognition and, when the user stops speaking, runs a
//! turn:
//!
//! ```text
//! utterance ─► generation ─► sentence segmenter ─► synthesis ─► audio chunks
//!                  │
//!                  └─ [SEARCH: q] ─► web search ─► grounded second leg
//! ```
//!
//! # Architecture
//!
//! - **Turn coordination** ([`pipeline`]): races a speculative web search
//!   against generation, decides early whether the reply needs search, and
//!   streams completed sentences to synthesis while generation continues.
//! - **Collaborators**: token generation ([`llm`]), speech synthesis
//!   ([`tts`]), speech recognition ([`stt`]) and web search ([`search`])
//!   sit behind traits so turns can run against in-process fakes.
//! - **Sessions** ([`session`], [`server`]): one conversation record per
//!   connected browser, barge-in, and recognition reconnects.

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod runtime;
pub mod search;
pub mod server;
pub mod session;
pub mod stt;
pub mod tts;
pub mod ws_client;

pub use config::SpeechConfig;
pub use conversation::{ConversationMessage, ConversationRecord, Role};
pub use error::{Result, SpeechError};
pub use pipeline::{EventSink, TurnCoordinator, TurnOutcome};
pub use runtime::{ClientMessage, RuntimeEvent};
pub use session::{Services, Session};
