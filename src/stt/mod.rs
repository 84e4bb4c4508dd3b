//! Streaming speech recognition.
//!
//! The session relays browser audio into a [`TranscriberStream`] and turns
//! each recognised transcript into a `transcript` event. When the stream's
//! transcript channel closes the session reconnects.

mod ws;

pub use ws::WsTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;

/// Opens recognition streams.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn connect(&self) -> Result<TranscriberStream>;
}

/// A live recognition connection.
///
/// Audio goes in as base64 strings; non-empty transcripts come out. The
/// `transcripts` channel closing means the connection is gone.
pub struct TranscriberStream {
    pub audio: mpsc::UnboundedSender<String>,
    pub transcripts: mpsc::UnboundedReceiver<String>,
    _task: Option<AbortOnDropHandle<()>>,
}

impl TranscriberStream {
    pub fn new(
        audio: mpsc::UnboundedSender<String>,
        transcripts: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            audio,
            transcripts,
            _task: None,
        }
    }

    /// Tie the connection's I/O task to this stream.
    pub fn with_task(mut self, task: tokio::task::JoinHandle<()>) -> Self {
        self._task = Some(AbortOnDropHandle::new(task));
        self
    }
}
