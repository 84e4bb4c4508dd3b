//! Error types for the baatein voice agent.

/// Top-level error type for the conversation pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// Speech-to-text connection or protocol error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Token-generation service error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech connection or protocol error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Web search error.
    #[error("search error: {0}")]
    Search(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Turn coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Browser transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<baatein_search::SearchError> for SpeechError {
    fn from(e: baatein_search::SearchError) -> Self {
        Self::Search(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SpeechError>;
