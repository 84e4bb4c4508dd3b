//! Message types passed between pipeline stages.

/// A complete, cleaned, non-empty sentence ready for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceFragment {
    /// Sentence text with markup and emoji removed.
    pub text: String,
}

/// One item on the hand-off queue between generation and synthesis.
///
/// Exactly one [`QueueItem::EndOfStream`] is sent per leg, always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    /// A sentence to speak.
    Fragment(SentenceFragment),
    /// No more sentences will follow on this leg.
    EndOfStream,
}

/// A chunk of synthesized audio relayed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Encoded audio exactly as produced by the synthesis service (base64).
    pub audio: String,
    /// 1-based position within the leg.
    pub chunk_num: u32,
}

/// Commands accepted by a synthesis session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisCommand {
    /// Convert this text to speech.
    Convert(String),
    /// Force emission of any audio still buffered by the service.
    Flush,
}

/// Output of a synthesis session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// One encoded audio chunk.
    Audio(String),
    /// The service has emitted everything it was asked to convert.
    Final,
}
