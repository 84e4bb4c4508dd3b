//! Barge-in and turn supersession through a [`Session`].

use crate::helpers::{FakeSearch, ScriptedLlm, ScriptedTranscriber, drain_events, services};
use baatein::config::SpeechConfig;
use baatein::conversation::ConversationMessage;
use baatein::pipeline::EventSink;
use baatein::runtime::RuntimeEvent;
use baatein::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

fn session(llm: Arc<ScriptedLlm>) -> (Arc<Session>, mpsc::UnboundedReceiver<RuntimeEvent>) {
    let (sink, events) = EventSink::channel();
    let services = services(
        llm,
        FakeSearch::new(Duration::from_millis(10)),
        ScriptedTranscriber::new(Vec::new()),
    );
    let session = Session::new(Uuid::new_v4(), &services, &SpeechConfig::default(), sink);
    (Arc::new(session), events)
}

#[tokio::test(start_paused = true)]
async fn barge_in_stops_audio_and_rolls_back() {
    let llm = ScriptedLlm::with_delay(
        vec![vec!["First. ", "Second. ", "Third. ", "Fourth. ", "Fifth."]],
        Duration::from_millis(200),
    );
    let (session, mut events) = session(llm);

    session.start_turn("tell me five things".into()).await;
    assert!(session.is_speaking());

    // Wait for the first sentence to be spoken.
    loop {
        match events.recv().await {
            Some(RuntimeEvent::AudioChunk { chunk_num: 1, .. }) => break,
            Some(_) => {}
            None => panic!("event channel closed"),
        }
    }

    assert!(session.barge_in().await);
    assert!(!session.is_speaking());
    assert!(!session.barge_in().await, "second barge-in is a no-op");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let after = drain_events(&mut events);
    assert_eq!(after.last(), Some(&RuntimeEvent::StopAudio));
    assert_eq!(
        after.iter().filter(|e| **e == RuntimeEvent::StopAudio).count(),
        1
    );
    assert_eq!(session.transcript().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn new_turn_supersedes_previous_without_stop_audio() {
    let llm = ScriptedLlm::with_delay(
        vec![
            vec!["A long answer. ", "That keeps going. ", "And going."],
            vec!["Short answer."],
        ],
        Duration::from_millis(300),
    );
    let (session, mut events) = session(llm);

    session.start_turn("first question".into()).await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    session.start_turn("second question".into()).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let all = drain_events(&mut events);
    assert!(!all.contains(&RuntimeEvent::StopAudio));
    assert_eq!(
        all.iter()
            .filter(|e| matches!(e, RuntimeEvent::TtsDone { .. }))
            .count(),
        1
    );

    let transcript = session.transcript().await;
    assert_eq!(
        transcript[1..],
        [
            ConversationMessage::user("second question"),
            ConversationMessage::assistant("Short answer."),
        ]
    );
    assert!(!session.is_speaking());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_live_turn() {
    let llm = ScriptedLlm::with_delay(
        vec![vec!["Never. ", "Finished."]],
        Duration::from_secs(1),
    );
    let (session, mut events) = session(llm);

    session.start_turn("anything".into()).await;
    session.shutdown().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let all = drain_events(&mut events);
    assert!(!all.contains(&RuntimeEvent::LlmDone));
    assert_eq!(session.transcript().await.len(), 1);
    assert!(!session.is_speaking());
}
