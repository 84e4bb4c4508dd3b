//! Synthesis consumer: drains the hand-off queue into numbered audio chunks.

use crate::pipeline::events::EventSink;
use crate::pipeline::messages::{AudioChunk, QueueItem, SynthesisCommand, SynthesisEvent};
use crate::tts::SpeechSynthesizer;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Feed queued sentences to a fresh synthesis session and relay its audio.
///
/// The feeder polls the queue every `poll_interval` and stops (after a
/// flush) on end-of-stream or cancellation. The reader numbers chunks from
/// 1 in arrival order and stops on the final marker or cancellation.
/// Returns the number of chunks delivered.
pub async fn drain(
    mut queue: mpsc::UnboundedReceiver<QueueItem>,
    cancel: &CancellationToken,
    synthesizer: &dyn SpeechSynthesizer,
    sink: &EventSink,
    poll_interval: Duration,
) -> u32 {
    let session = tokio::select! {
        biased;
        () = cancel.cancelled() => return 0,
        session = synthesizer.open() => session,
    };
    let (commands, mut events, _tasks) = match session {
        Ok(session) => session.into_parts(),
        Err(e) => {
            warn!("synthesis unavailable: {e}");
            return 0;
        }
    };

    let feeder = async move {
        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = commands.send(SynthesisCommand::Flush);
                    break;
                }
                polled = tokio::time::timeout(poll_interval, queue.recv()) => polled,
            };
            match polled {
                Err(_) => continue,
                Ok(Some(QueueItem::Fragment(fragment))) => {
                    if commands
                        .send(SynthesisCommand::Convert(format!("{} ", fragment.text)))
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(Some(QueueItem::EndOfStream)) | Ok(None) => {
                    let _ = commands.send(SynthesisCommand::Flush);
                    break;
                }
            }
        }
    };

    let reader = async {
        let mut count = 0u32;
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("synthesis cancelled");
                    break;
                }
                event = events.recv() => event,
            };
            match event {
                Some(SynthesisEvent::Audio(audio)) => {
                    let chunk = AudioChunk {
                        audio,
                        chunk_num: count + 1,
                    };
                    if !sink.emit_audio(cancel, chunk) {
                        break;
                    }
                    count += 1;
                }
                Some(SynthesisEvent::Final) | None => break,
            }
        }
        count
    };

    let ((), count) = tokio::join!(feeder, reader);
    count
}
