//! Generation producer: streams one leg's tokens into the hand-off queue.

use crate::conversation::ConversationMessage;
use crate::llm::TokenGenerator;
use crate::pipeline::decision::{SearchDecider, SearchDecision};
use crate::pipeline::events::EventSink;
use crate::pipeline::messages::{QueueItem, SentenceFragment};
use crate::pipeline::segmenter;
use crate::runtime::RuntimeEvent;
use futures_util::StreamExt;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a generation leg produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// Every generated increment, concatenated.
    pub text: String,
    /// The leg's final search decision.
    pub decision: SearchDecision,
}

/// Stream tokens for `messages`, forwarding each as an `llm_chunk` and
/// feeding complete sentences to `queue` once the leg is a direct answer.
///
/// The decision is reported on `decided` exactly once, as soon as it is
/// known. Exactly one [`QueueItem::EndOfStream`] is sent, last, however the
/// leg ends.
pub async fn produce(
    generator: &dyn TokenGenerator,
    messages: Vec<ConversationMessage>,
    mut decider: SearchDecider,
    queue: mpsc::UnboundedSender<QueueItem>,
    decided: oneshot::Sender<SearchDecision>,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> GenerationOutput {
    let started = Instant::now();
    let mut decided = Some(decided);
    if decider.is_decided() {
        report(&mut decided, decider.state());
    }

    let enqueue = |fragment: SentenceFragment| {
        debug!(sentence = %fragment.text, "sentence -> synthesis");
        let _ = queue.send(QueueItem::Fragment(fragment));
    };

    let mut tokens = generator.stream(messages, cancel.clone());
    let mut text = String::new();
    let mut buffer = String::new();
    let mut first_token = true;

    loop {
        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            token = tokens.next() => token,
        };
        let Some(token) = token else {
            break;
        };
        if first_token {
            first_token = false;
            debug!(elapsed = started.elapsed().as_secs_f64(), "first token");
        }

        text.push_str(&token);
        let chunk = RuntimeEvent::LlmChunk {
            text: token.clone(),
        };
        if !sink.emit(cancel, chunk) && cancel.is_cancelled() {
            break;
        }

        match decider.state() {
            SearchDecision::Undecided => match decider.observe(&text) {
                Some(SearchDecision::SearchNeeded) => {
                    info!("search directive detected");
                    report(&mut decided, SearchDecision::SearchNeeded);
                }
                Some(SearchDecision::DirectAnswer) => {
                    debug!("direct answer, streaming to synthesis");
                    buffer = segmenter::extract(&text, enqueue);
                    report(&mut decided, SearchDecision::DirectAnswer);
                }
                _ => {}
            },
            SearchDecision::DirectAnswer => {
                buffer.push_str(&token);
                buffer = segmenter::extract(&buffer, enqueue);
            }
            SearchDecision::SearchNeeded => {}
        }
    }

    let was_undecided = !decider.is_decided();
    let decision = decider.finish(&text);
    if decision == SearchDecision::DirectAnswer && !cancel.is_cancelled() {
        if was_undecided {
            buffer = segmenter::extract(&text, enqueue);
        }
        if let Some(fragment) = segmenter::fragment_from(&buffer) {
            enqueue(fragment);
        }
    }
    let _ = queue.send(QueueItem::EndOfStream);
    report(&mut decided, decision);

    debug!(
        elapsed = started.elapsed().as_secs_f64(),
        chars = text.len(),
        "generation leg finished"
    );
    GenerationOutput { text, decision }
}

fn report(slot: &mut Option<oneshot::Sender<SearchDecision>>, decision: SearchDecision) {
    if let Some(tx) = slot.take() {
        let _ = tx.send(decision);
    }
}
