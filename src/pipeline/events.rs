//! Outbound event channel shared by a session and its turns.
//!
//! Turn-scoped events are only delivered while the turn's cancellation token
//! is clear. Delivery and [`EventSink::interrupt`] serialise on one gate, so
//! once `stop_audio` is queued no later event from the interrupted turn can
//! follow it.

use crate::pipeline::messages::AudioChunk;
use crate::runtime::RuntimeEvent;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
    gate: Arc<Mutex<()>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self {
            tx,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// A sink plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RuntimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Send a session-level event (transcripts, keep-alive).
    ///
    /// Returns `false` once the receiver is gone.
    pub fn send(&self, event: RuntimeEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Send an event on behalf of the turn owning `cancel`.
    ///
    /// Returns `false`, sending nothing, if the turn is cancelled or the
    /// receiver is gone.
    pub fn emit(&self, cancel: &CancellationToken, event: RuntimeEvent) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        !cancel.is_cancelled() && self.tx.send(event).is_ok()
    }

    /// Relay one synthesized chunk for the turn owning `cancel`.
    pub fn emit_audio(&self, cancel: &CancellationToken, chunk: AudioChunk) -> bool {
        self.emit(
            cancel,
            RuntimeEvent::AudioChunk {
                audio: chunk.audio,
                chunk_num: chunk.chunk_num,
            },
        )
    }

    /// Cancel the turn owning `cancel` and queue `stop_audio`.
    ///
    /// Returns `false` if the turn was already cancelled.
    pub fn interrupt(&self, cancel: &CancellationToken) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() {
            return false;
        }
        cancel.cancel();
        let _ = self.tx.send(RuntimeEvent::StopAudio);
        true
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
