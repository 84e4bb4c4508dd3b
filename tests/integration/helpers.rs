//! In-process fake collaborators shared by the integration tests.

use async_trait::async_trait;
use baatein::config::PipelineConfig;
use baatein::conversation::{ConversationMessage, ConversationRecord};
use baatein::error::{Result, SpeechError};
use baatein::llm::{TokenGenerator, TokenStream};
use baatein::pipeline::messages::{SynthesisCommand, SynthesisEvent};
use baatein::pipeline::{EventSink, TurnCoordinator};
use baatein::runtime::RuntimeEvent;
use baatein::search::SearchBackend;
use baatein::session::Services;
use baatein::stt::{Transcriber, TranscriberStream};
use baatein::tts::{SpeechSynthesizer, SynthesisSession};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub(crate) const SYSTEM_PROMPT: &str = "You are a test assistant.";

/// Replays one token script per call, optionally pausing before each token.
pub(crate) struct ScriptedLlm {
    scripts: Mutex<VecDeque<Vec<String>>>,
    delay: Duration,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedLlm {
    pub(crate) fn new(scripts: Vec<Vec<&str>>) -> Arc<Self> {
        Self::with_delay(scripts, Duration::ZERO)
    }

    pub(crate) fn with_delay(scripts: Vec<Vec<&str>>, delay: Duration) -> Arc<Self> {
        let scripts = scripts
            .into_iter()
            .map(|s| s.into_iter().map(str::to_owned).collect())
            .collect();
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// The message lists received so far, one per call.
    pub(crate) fn calls(&self) -> Vec<Vec<ConversationMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

impl TokenGenerator for ScriptedLlm {
    fn stream(&self, messages: Vec<ConversationMessage>, cancel: CancellationToken) -> TokenStream {
        self.calls.lock().unwrap().push(messages);
        let tokens = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let delay = self.delay;
        Box::pin(async_stream::stream! {
            for token in tokens {
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                if cancel.is_cancelled() {
                    return;
                }
                yield token;
            }
        })
    }
}

/// Answers every converted fragment with one chunk `audio<fragment>` and
/// the final marker on flush.
#[derive(Default)]
pub(crate) struct EchoSynth {
    opened: AtomicUsize,
}

impl EchoSynth {
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for EchoSynth {
    async fn open(&self) -> Result<SynthesisSession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(command) = cmd_rx.recv().await {
                let event = match command {
                    SynthesisCommand::Convert(text) => {
                        SynthesisEvent::Audio(format!("audio<{}>", text.trim()))
                    }
                    SynthesisCommand::Flush => SynthesisEvent::Final,
                };
                if evt_tx.send(event).is_err() {
                    break;
                }
            }
        });
        Ok(SynthesisSession::new(cmd_tx, evt_rx).with_task(task))
    }
}

/// Search provider with a fixed latency that records every query.
pub(crate) struct FakeSearch {
    delay: Duration,
    fail: bool,
    queries: Mutex<Vec<String>>,
    completed: AtomicUsize,
}

impl FakeSearch {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail: false,
            queries: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        })
    }

    pub(crate) fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail: true,
            queries: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        })
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Searches that ran to completion (not cancelled).
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn search(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_owned());
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SpeechError::Search("provider down".into()))
        } else {
            Ok(format!("- results for {query}"))
        }
    }
}

/// Hands out a connection that replays `transcripts` once, then stays open.
#[derive(Default)]
pub(crate) struct ScriptedTranscriber {
    transcripts: Mutex<Vec<String>>,
}

impl ScriptedTranscriber {
    pub(crate) fn new(transcripts: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            transcripts: Mutex::new(transcripts.into_iter().map(str::to_owned).collect()),
        })
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn connect(&self) -> Result<TranscriberStream> {
        let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<String>();
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let pending = std::mem::take(&mut *self.transcripts.lock().unwrap());
        for text in pending {
            let _ = transcript_tx.send(text);
        }
        let task = tokio::spawn(async move {
            let _open = transcript_tx;
            while audio_rx.recv().await.is_some() {}
        });
        Ok(TranscriberStream::new(audio_tx, transcript_rx).with_task(task))
    }
}

/// A coordinator over fakes plus the receiving end of its events.
pub(crate) struct Harness {
    pub coordinator: TurnCoordinator,
    pub record: Arc<tokio::sync::Mutex<ConversationRecord>>,
    pub sink: EventSink,
    pub events: mpsc::UnboundedReceiver<RuntimeEvent>,
    pub synth: Arc<EchoSynth>,
}

pub(crate) fn harness(llm: Arc<ScriptedLlm>, search: Arc<FakeSearch>) -> Harness {
    let (sink, events) = EventSink::channel();
    let synth = Arc::new(EchoSynth::default());
    let record = Arc::new(tokio::sync::Mutex::new(ConversationRecord::new(SYSTEM_PROMPT)));
    let coordinator = TurnCoordinator::new(
        llm,
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        search,
        Arc::clone(&record),
        sink.clone(),
        PipelineConfig::default(),
    );
    Harness {
        coordinator,
        record,
        sink,
        events,
        synth,
    }
}

pub(crate) fn services(
    llm: Arc<ScriptedLlm>,
    search: Arc<FakeSearch>,
    transcriber: Arc<ScriptedTranscriber>,
) -> Services {
    Services {
        generator: llm,
        synthesizer: Arc::new(EchoSynth::default()),
        search,
        transcriber,
    }
}

/// Everything currently queued on `rx`.
pub(crate) fn drain_events(rx: &mut mpsc::UnboundedReceiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// Events other than audio chunks, in order.
pub(crate) fn without_audio(events: &[RuntimeEvent]) -> Vec<RuntimeEvent> {
    events
        .iter()
        .filter(|e| !matches!(e, RuntimeEvent::AudioChunk { .. }))
        .cloned()
        .collect()
}

/// `(chunk_num, audio)` of every audio chunk, in order.
pub(crate) fn audio_chunks(events: &[RuntimeEvent]) -> Vec<(u32, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::AudioChunk { audio, chunk_num } => Some((*chunk_num, audio.clone())),
            _ => None,
        })
        .collect()
}

pub(crate) fn chunk(text: &str) -> RuntimeEvent {
    RuntimeEvent::LlmChunk {
        text: text.to_owned(),
    }
}
