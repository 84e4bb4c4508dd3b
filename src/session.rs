//! Per-browser conversation session.
//!
//! A session owns one conversation record and at most one live turn. It
//! relays browser audio to speech recognition, collects transcripts into the
//! pending utterance, and starts a turn when the browser reports the end of
//! speech. Turns start in the order their utterances arrived, and starting
//! one always unwinds the previous one first, so turns on one session never
//! overlap.

use crate::config::SpeechConfig;
use crate::conversation::{ConversationMessage, ConversationRecord};
use crate::error::Result;
use crate::llm::{ApiLlm, TokenGenerator};
use crate::pipeline::{EventSink, TurnCoordinator, TurnOutcome};
use crate::runtime::{ClientMessage, RuntimeEvent};
use crate::search::{SearchBackend, WebSearch};
use crate::stt::{Transcriber, WsTranscriber};
use crate::tts::{SpeechSynthesizer, WsSynthesizer};
use futures_util::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The external collaborators every session talks to.
#[derive(Clone)]
pub struct Services {
    pub generator: Arc<dyn TokenGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub search: Arc<dyn SearchBackend>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl Services {
    /// Network-backed collaborators built from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation HTTP client cannot be built.
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        Ok(Self {
            generator: Arc::new(ApiLlm::new(&config.llm)?),
            synthesizer: Arc::new(WsSynthesizer::new(config.tts.clone())),
            search: Arc::new(WebSearch::new(&config.search)),
            transcriber: Arc::new(WsTranscriber::new(config.stt.clone())),
        })
    }
}

/// Session timing, taken from the server, recognition and pipeline sections.
#[derive(Debug, Clone, Copy)]
struct SessionTiming {
    keep_alive: Duration,
    connect_retry: Duration,
    reconnect_delay: Duration,
    unwind_timeout: Duration,
}

impl SessionTiming {
    fn from_config(config: &SpeechConfig) -> Self {
        Self {
            keep_alive: Duration::from_millis(config.server.keep_alive_interval_ms.max(1)),
            connect_retry: Duration::from_millis(config.stt.connect_retry_ms),
            reconnect_delay: Duration::from_millis(config.stt.reconnect_delay_ms),
            unwind_timeout: config.pipeline.unwind_timeout(),
        }
    }
}

struct LiveTurn {
    cancel: CancellationToken,
    handle: JoinHandle<TurnOutcome>,
}

pub struct Session {
    id: Uuid,
    coordinator: Arc<TurnCoordinator>,
    sink: EventSink,
    transcriber: Arc<dyn Transcriber>,
    timing: SessionTiming,
    /// Transcripts received since the last end of speech.
    utterance: std::sync::Mutex<Vec<String>>,
    /// Audio input of the current recognition connection, if any.
    stt_audio: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
    speaking: Arc<AtomicBool>,
    live: tokio::sync::Mutex<Option<LiveTurn>>,
    closed: CancellationToken,
}

impl Session {
    /// Create a session with a fresh conversation record.
    pub fn new(id: Uuid, services: &Services, config: &SpeechConfig, sink: EventSink) -> Self {
        let record = ConversationRecord::new(config.llm.system_prompt.clone());
        Self::with_record(id, services, config, sink, record)
    }

    /// Create a session continuing an existing record.
    pub fn with_record(
        id: Uuid,
        services: &Services,
        config: &SpeechConfig,
        sink: EventSink,
        record: ConversationRecord,
    ) -> Self {
        let coordinator = TurnCoordinator::new(
            Arc::clone(&services.generator),
            Arc::clone(&services.synthesizer),
            Arc::clone(&services.search),
            Arc::new(tokio::sync::Mutex::new(record)),
            sink.clone(),
            config.pipeline.clone(),
        );
        Self {
            id,
            coordinator: Arc::new(coordinator),
            sink,
            transcriber: Arc::clone(&services.transcriber),
            timing: SessionTiming::from_config(config),
            utterance: std::sync::Mutex::new(Vec::new()),
            stt_audio: std::sync::Mutex::new(None),
            speaking: Arc::new(AtomicBool::new(false)),
            live: tokio::sync::Mutex::new(None),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the assistant is currently producing a response.
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// A copy of the conversation so far.
    pub async fn transcript(&self) -> Vec<ConversationMessage> {
        self.coordinator.record().lock().await.snapshot()
    }

    /// Drive the session until `incoming` ends, then shut it down.
    ///
    /// `incoming` yields the browser's text frames. Recognition and
    /// keep-alive run alongside and stop with the session.
    pub async fn run<S>(self: Arc<Self>, mut incoming: S)
    where
        S: Stream<Item = String> + Unpin,
    {
        info!(session = %self.id, "session started");
        let _recognition =
            AbortOnDropHandle::new(tokio::spawn(Arc::clone(&self).run_recognition()));
        let _keep_alive = AbortOnDropHandle::new(tokio::spawn(Arc::clone(&self).run_keep_alive()));

        while let Some(text) = incoming.next().await {
            match ClientMessage::parse(&text) {
                Some(message) => self.handle(message).await,
                None => debug!(session = %self.id, "ignoring unrecognised client message"),
            }
        }

        self.shutdown().await;
        info!(session = %self.id, "session ended");
    }

    /// React to one browser message.
    pub async fn handle(self: &Arc<Self>, message: ClientMessage) {
        match message {
            ClientMessage::AudioChunk { data } => self.relay_audio(data),
            ClientMessage::UserStoppedSpeaking => self.end_of_speech().await,
            ClientMessage::BargeIn => {
                self.barge_in().await;
            }
        }
    }

    fn relay_audio(&self, data: String) {
        let guard = self.stt_audio.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(data);
            }
            None => debug!(session = %self.id, "no recognition connection, dropping audio"),
        }
    }

    /// Turn the pending transcripts into an utterance and start a turn.
    ///
    /// Returns once the turn is live and the session is marked speaking.
    async fn end_of_speech(&self) {
        let parts = std::mem::take(
            &mut *self.utterance.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let utterance = parts.join(" ").trim().to_owned();
        if utterance.is_empty() {
            info!(session = %self.id, "end of speech with no transcript, ignoring");
            return;
        }

        info!(session = %self.id, %utterance, "final transcript");
        self.sink.send(RuntimeEvent::FinalTranscript {
            text: utterance.clone(),
        });
        self.start_turn(utterance).await;
    }

    /// Interrupt the live turn if the assistant is speaking.
    ///
    /// Returns whether a turn was interrupted.
    pub async fn barge_in(&self) -> bool {
        if !self.is_speaking() {
            debug!(session = %self.id, "barge-in while idle, ignoring");
            return false;
        }
        let live = self.live.lock().await;
        let Some(turn) = live.as_ref() else {
            return false;
        };
        if self.sink.interrupt(&turn.cancel) {
            self.speaking.store(false, Ordering::SeqCst);
            info!(session = %self.id, "barge-in: response interrupted");
            true
        } else {
            false
        }
    }

    /// Cancel and unwind any previous turn, then start one for `utterance`.
    ///
    /// The previous turn gets the configured unwind bound to finish; after
    /// that it is aborted, which rolls back its record changes.
    pub async fn start_turn(&self, utterance: String) {
        let mut live = self.live.lock().await;
        if let Some(previous) = live.take() {
            self.unwind(previous).await;
        }
        if self.closed.is_cancelled() {
            return;
        }

        let cancel = self.closed.child_token();
        self.speaking.store(true, Ordering::SeqCst);
        let coordinator = Arc::clone(&self.coordinator);
        let speaking = Arc::clone(&self.speaking);
        let token = cancel.clone();
        let id = self.id;
        let handle = tokio::spawn(async move {
            let outcome = coordinator.run(&utterance, token.clone()).await;
            if !token.is_cancelled() {
                speaking.store(false, Ordering::SeqCst);
            }
            info!(session = %id, ?outcome, "turn finished");
            outcome
        });
        *live = Some(LiveTurn { cancel, handle });
    }

    async fn unwind(&self, previous: LiveTurn) {
        previous.cancel.cancel();
        let abort = previous.handle.abort_handle();
        match tokio::time::timeout(self.timing.unwind_timeout, previous.handle).await {
            Ok(Ok(outcome)) => debug!(session = %self.id, ?outcome, "previous turn unwound"),
            Ok(Err(e)) => debug!(session = %self.id, "previous turn ended abnormally: {e}"),
            Err(_) => {
                warn!(
                    session = %self.id,
                    "previous turn still running after {:?}, aborting",
                    self.timing.unwind_timeout
                );
                abort.abort();
            }
        }
    }

    /// Cancel the live turn and stop background work.
    pub async fn shutdown(&self) {
        self.closed.cancel();
        let mut live = self.live.lock().await;
        if let Some(previous) = live.take() {
            self.unwind(previous).await;
        }
        self.speaking.store(false, Ordering::SeqCst);
        *self.stt_audio.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Keep a recognition connection open, reconnecting when it drops.
    async fn run_recognition(self: Arc<Self>) {
        loop {
            let connected = tokio::select! {
                biased;
                () = self.closed.cancelled() => return,
                connected = self.transcriber.connect() => connected,
            };
            let mut stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(session = %self.id, "speech recognition connect failed: {e}");
                    if !self.pause(self.timing.connect_retry).await {
                        return;
                    }
                    continue;
                }
            };
            *self.stt_audio.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(stream.audio.clone());

            loop {
                let transcript = tokio::select! {
                    biased;
                    () = self.closed.cancelled() => return,
                    transcript = stream.transcripts.recv() => transcript,
                };
                let Some(text) = transcript else {
                    break;
                };
                debug!(session = %self.id, %text, "transcript");
                self.utterance
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(text.clone());
                self.sink.send(RuntimeEvent::Transcript { text });
            }

            *self.stt_audio.lock().unwrap_or_else(PoisonError::into_inner) = None;
            info!(session = %self.id, "speech recognition stream ended, reconnecting");
            if !self.pause(self.timing.reconnect_delay).await {
                return;
            }
        }
    }

    async fn run_keep_alive(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timing.keep_alive);
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                () = self.closed.cancelled() => return,
                _ = interval.tick() => {
                    if !self.sink.send(RuntimeEvent::Ping) {
                        return;
                    }
                }
            }
        }
    }

    /// Sleep unless the session closes first; `false` if it closed.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
