//! Speech synthesis.
//!
//! A [`SpeechSynthesizer`] opens one [`SynthesisSession`] per generation
//! leg. [`WsSynthesizer`] talks to the streaming synthesis websocket.

mod ws;

pub use ws::WsSynthesizer;

use crate::error::Result;
use crate::pipeline::messages::{SynthesisCommand, SynthesisEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;

/// Opens synthesis sessions.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Open a fresh session ready to accept text.
    async fn open(&self) -> Result<SynthesisSession>;
}

/// A live synthesis connection: commands in, events out.
///
/// Dropping the session stops any background I/O tasks it owns.
pub struct SynthesisSession {
    pub commands: mpsc::UnboundedSender<SynthesisCommand>,
    pub events: mpsc::UnboundedReceiver<SynthesisEvent>,
    tasks: Vec<AbortOnDropHandle<()>>,
}

impl SynthesisSession {
    pub fn new(
        commands: mpsc::UnboundedSender<SynthesisCommand>,
        events: mpsc::UnboundedReceiver<SynthesisEvent>,
    ) -> Self {
        Self {
            commands,
            events,
            tasks: Vec::new(),
        }
    }

    /// Tie a background task's lifetime to this session.
    pub fn with_task(mut self, task: tokio::task::JoinHandle<()>) -> Self {
        self.tasks.push(AbortOnDropHandle::new(task));
        self
    }

    /// Split into the command sender, the event receiver, and a guard that
    /// keeps the background tasks alive.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<SynthesisCommand>,
        mpsc::UnboundedReceiver<SynthesisEvent>,
        Vec<AbortOnDropHandle<()>>,
    ) {
        (self.commands, self.events, self.tasks)
    }
}
