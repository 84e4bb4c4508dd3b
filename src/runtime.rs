//! Events emitted to the browser, serialized as `type`-tagged JSON.

use serde::{Deserialize, Serialize};

/// Everything the server sends to a connected browser.
///
/// Within one turn the order is `tts_start`, zero or more `llm_chunk`,
/// optionally `search_start` + `search_audio_done` and a second
/// `tts_start`, then `llm_done` and `tts_done`. `audio_chunk` events
/// interleave on the synthesis consumer's own schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A synthesis leg is about to start streaming audio.
    TtsStart,
    /// Raw generated text increment.
    LlmChunk { text: String },
    /// The turn is waiting on web search results.
    SearchStart,
    /// Search results are in; the grounded answer follows.
    SearchAudioDone,
    /// Generation for the turn has finished.
    LlmDone,
    /// The turn committed successfully.
    TtsDone {
        /// Seconds since the turn started, rounded to two decimals.
        total_time: f64,
    },
    /// Synthesized audio for the current leg.
    AudioChunk { audio: String, chunk_num: u32 },
    /// Stop any audio still queued in the browser (barge-in).
    StopAudio,
    /// Partial recognition result.
    Transcript { text: String },
    /// The utterance handed to the turn coordinator.
    FinalTranscript { text: String },
    /// Keep-alive.
    Ping,
}

impl RuntimeEvent {
    /// Serialize to the JSON text frame sent over the socket.
    pub fn to_json(&self) -> String {
        // Serializing a plain enum of strings and numbers cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Messages a browser sends over the session socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Base64 audio captured from the microphone.
    AudioChunk { data: String },
    /// Client-side voice activity detection saw the end of an utterance.
    UserStoppedSpeaking,
    /// The user started talking over the assistant.
    BargeIn,
}

impl ClientMessage {
    /// Parse one text frame; `None` for unknown or malformed messages.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
