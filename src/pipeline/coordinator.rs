//! Turn coordinator: runs one utterance through generation, optional web
//! search, and synthesis, then commits the reply to the conversation.
//!
//! ```text
//! Idle ─► Racing (generation ∥ speculative search ∥ synthesis)
//!            │
//!            ├─ direct answer ─────────────────────────────► Committed
//!            └─ search needed ─► SearchRound (gen ∥ synth) ─► Committed
//!
//! cancellation at any point ─► Aborted (record rolled back)
//! ```
//!
//! The coordinator holds the conversation lock for the whole turn, so two
//! turns can never interleave writes. Every message appended during a turn
//! is removed again unless the turn commits, including when the turn's
//! future is dropped mid-flight.

use crate::config::PipelineConfig;
use crate::conversation::{ConversationMessage, ConversationRecord};
use crate::llm::TokenGenerator;
use crate::pipeline::decision::{
    SearchDecider, SearchDecision, extract_directive_query, unclosed_directive_query,
};
use crate::pipeline::events::EventSink;
use crate::pipeline::generation::{GenerationOutput, produce};
use crate::pipeline::speculative::SpeculativeSearch;
use crate::pipeline::synthesis;
use crate::runtime::RuntimeEvent;
use crate::search::{SearchBackend, clean_for_search, query_similarity, search_or_error_text};
use crate::tts::SpeechSynthesizer;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transcript text shown while the search runs.
const SEARCHING_NOTICE: &str = "\n\nSearching the web...\n";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnOutcome {
    /// The reply was spoken and recorded.
    Committed {
        /// Seconds from turn start to commit, rounded to two decimals.
        total_time: f64,
    },
    /// Generation produced no text; nothing was recorded.
    Empty,
    /// The turn was cancelled; nothing was recorded.
    Cancelled,
}

/// One synthesis leg's results.
#[derive(Debug)]
struct LegOutput {
    generation: GenerationOutput,
    chunks: u32,
}

/// Messages appended during a turn, rolled back on drop unless committed.
struct TurnScope {
    record: OwnedMutexGuard<ConversationRecord>,
    baseline: usize,
    committed: bool,
}

impl TurnScope {
    fn begin(mut record: OwnedMutexGuard<ConversationRecord>, utterance: &str) -> Self {
        record.sanitize();
        let baseline = record.len();
        record.push(ConversationMessage::user(utterance));
        Self {
            record,
            baseline,
            committed: false,
        }
    }

    fn snapshot(&self) -> Vec<ConversationMessage> {
        self.record.snapshot()
    }

    fn push(&mut self, message: ConversationMessage) {
        self.record.push(message);
    }

    fn pop(&mut self) {
        if self.record.len() > self.baseline + 1 {
            self.record.pop();
        }
    }

    fn commit(mut self, reply: String) {
        self.record.push(ConversationMessage::assistant(reply));
        self.committed = true;
    }
}

impl Drop for TurnScope {
    fn drop(&mut self) {
        if !self.committed {
            self.record.truncate(self.baseline);
        }
    }
}

/// Runs turns against one conversation record.
pub struct TurnCoordinator {
    generator: Arc<dyn TokenGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    search: Arc<dyn SearchBackend>,
    record: Arc<Mutex<ConversationRecord>>,
    sink: EventSink,
    config: PipelineConfig,
}

impl TurnCoordinator {
    pub fn new(
        generator: Arc<dyn TokenGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        search: Arc<dyn SearchBackend>,
        record: Arc<Mutex<ConversationRecord>>,
        sink: EventSink,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            search,
            record,
            sink,
            config,
        }
    }

    /// The conversation record this coordinator writes to.
    pub fn record(&self) -> &Arc<Mutex<ConversationRecord>> {
        &self.record
    }

    /// Run one turn for `utterance` until it commits, produces nothing, or
    /// `cancel` fires.
    pub async fn run(&self, utterance: &str, cancel: CancellationToken) -> TurnOutcome {
        let started = Instant::now();
        let record = tokio::select! {
            biased;
            () = cancel.cancelled() => return TurnOutcome::Cancelled,
            record = Arc::clone(&self.record).lock_owned() => record,
        };
        let mut scope = TurnScope::begin(record, utterance);

        self.sink.emit(&cancel, RuntimeEvent::TtsStart);
        info!(%utterance, "turn started");

        let heuristic_query = clean_for_search(utterance);
        let speculative =
            SpeculativeSearch::spawn(Arc::clone(&self.search), heuristic_query, &cancel);

        let first = self
            .run_leg(
                scope.snapshot(),
                SearchDecider::new(
                    self.config.lookahead_chars,
                    self.config.directive_open.as_str(),
                ),
                &cancel,
            )
            .await;
        if cancel.is_cancelled() {
            speculative.cancel();
            info!("turn cancelled during generation");
            return TurnOutcome::Cancelled;
        }
        debug!(
            elapsed = started.elapsed().as_secs_f64(),
            chunks = first.chunks,
            "first leg done"
        );

        let reply = match first.generation.decision {
            SearchDecision::SearchNeeded => {
                let grounded = self
                    .search_round(&mut scope, &first.generation.text, speculative, &cancel)
                    .await;
                match grounded {
                    Some(text) => text,
                    None => {
                        info!("turn cancelled during search round");
                        return TurnOutcome::Cancelled;
                    }
                }
            }
            SearchDecision::DirectAnswer | SearchDecision::Undecided => {
                speculative.cancel();
                first.generation.text
            }
        };

        self.sink.emit(&cancel, RuntimeEvent::LlmDone);
        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        if reply.trim().is_empty() {
            info!("no speakable text");
            return TurnOutcome::Empty;
        }

        scope.commit(reply);
        let total_time = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        self.sink.emit(&cancel, RuntimeEvent::TtsDone { total_time });
        info!(total_time, "turn committed");
        TurnOutcome::Committed { total_time }
    }

    /// Run generation and synthesis concurrently for one leg.
    ///
    /// Synthesis waits for the leg's decision and only runs for a direct
    /// answer.
    async fn run_leg(
        &self,
        messages: Vec<ConversationMessage>,
        decider: SearchDecider,
        cancel: &CancellationToken,
    ) -> LegOutput {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (decided_tx, decided_rx) = oneshot::channel();

        let producer = produce(
            self.generator.as_ref(),
            messages,
            decider,
            queue_tx,
            decided_tx,
            &self.sink,
            cancel,
        );
        let consumer = async {
            match decided_rx.await {
                Ok(SearchDecision::DirectAnswer) if !cancel.is_cancelled() => {
                    synthesis::drain(
                        queue_rx,
                        cancel,
                        self.synthesizer.as_ref(),
                        &self.sink,
                        self.config.queue_poll_interval(),
                    )
                    .await
                }
                _ => 0,
            }
        };

        let (generation, chunks) = tokio::join!(producer, consumer);
        LegOutput { generation, chunks }
    }

    /// Resolve the search directive and speak a search-grounded answer.
    ///
    /// Returns the grounded reply, or `None` if the turn was cancelled.
    async fn search_round(
        &self,
        scope: &mut TurnScope,
        directive: &str,
        speculative: SpeculativeSearch,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let query = extract_directive_query(
            directive,
            &self.config.directive_open,
            &self.config.directive_close,
        )
        .or_else(|| unclosed_directive_query(directive, &self.config.directive_open))
        .unwrap_or_else(|| speculative.query().to_owned());

        self.sink.emit(
            cancel,
            RuntimeEvent::LlmChunk {
                text: SEARCHING_NOTICE.to_owned(),
            },
        );
        self.sink.emit(cancel, RuntimeEvent::SearchStart);

        let search_started = Instant::now();
        let similarity = query_similarity(speculative.query(), &query);
        info!(
            similarity,
            heuristic = %speculative.query(),
            model = %query,
            "resolving search"
        );

        let results = if similarity >= self.config.similarity_threshold {
            match speculative
                .join(self.config.speculative_search_timeout())
                .await
            {
                Ok(results) => {
                    debug!(
                        waited = search_started.elapsed().as_secs_f64(),
                        "using speculative results"
                    );
                    results
                }
                Err(e) => {
                    warn!("speculative search failed ({e}), searching again");
                    self.fresh_search(&query, cancel).await?
                }
            }
        } else {
            speculative.cancel();
            self.fresh_search(&query, cancel).await?
        };
        debug!(elapsed = search_started.elapsed().as_secs_f64(), "search resolved");

        if cancel.is_cancelled() {
            return None;
        }
        self.sink.emit(cancel, RuntimeEvent::SearchAudioDone);

        scope.push(ConversationMessage::assistant(directive));
        scope.push(ConversationMessage::user(search_prompt(&query, &results)));

        self.sink.emit(
            cancel,
            RuntimeEvent::LlmChunk {
                text: "\n\n".to_owned(),
            },
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(self.config.search_leg_pause()) => {}
        }
        self.sink.emit(cancel, RuntimeEvent::TtsStart);

        let second = self
            .run_leg(scope.snapshot(), SearchDecider::direct(), cancel)
            .await;
        scope.pop();
        scope.pop();

        if cancel.is_cancelled() {
            return None;
        }
        debug!(chunks = second.chunks, "search leg done");
        Some(second.generation.text)
    }

    async fn fresh_search(&self, query: &str, cancel: &CancellationToken) -> Option<String> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            results = search_or_error_text(self.search.as_ref(), query) => Some(results),
        }
    }
}

/// Second-leg user message embedding the search results.
pub fn search_prompt(query: &str, results: &str) -> String {
    format!(
        "Here are the web search results for '{query}':\n\n{results}\n\n\
         Synthesize a comprehensive and natural answer for speaking aloud. \
         Do NOT say 'Here is what I found'. Just give the detailed answer."
    )
}
