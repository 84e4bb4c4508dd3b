//! Configuration files changing turn behaviour.

use crate::helpers::{EchoSynth, FakeSearch, ScriptedLlm};
use baatein::config::SpeechConfig;
use baatein::conversation::ConversationRecord;
use baatein::pipeline::{EventSink, TurnCoordinator, TurnOutcome};
use baatein::runtime::RuntimeEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn custom_directive_markers_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[pipeline]
directive_open = "<<lookup:"
directive_close = ">>"
search_leg_pause_ms = 10

[llm]
system_prompt = "Use <<lookup: query>> when you need the web."
"#,
    )
    .unwrap();
    let config = SpeechConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    let llm = ScriptedLlm::new(vec![
        vec!["<<lookup: Mumbai weather today>>"],
        vec!["Hot."],
    ]);
    let search = FakeSearch::new(Duration::from_millis(10));
    let (sink, mut events) = EventSink::channel();
    let record = Arc::new(tokio::sync::Mutex::new(ConversationRecord::new(
        config.llm.system_prompt.clone(),
    )));
    let coordinator = TurnCoordinator::new(
        llm.clone(),
        Arc::new(EchoSynth::default()),
        search,
        Arc::clone(&record),
        sink,
        config.pipeline.clone(),
    );

    let outcome = coordinator
        .run("what's the weather in Mumbai today", CancellationToken::new())
        .await;
    assert!(matches!(outcome, TurnOutcome::Committed { .. }));

    let calls = llm.calls();
    assert_eq!(calls[0][0].content, "Use <<lookup: query>> when you need the web.");
    assert!(
        calls[1][3]
            .content
            .starts_with("Here are the web search results for 'Mumbai weather today':")
    );
    let received: Vec<RuntimeEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(received.contains(&RuntimeEvent::SearchStart));
    assert_eq!(record.lock().await.len(), 3);
}

#[test]
fn invalid_threshold_in_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline]\nsimilarity_threshold = 1.5\n").unwrap();
    let config = SpeechConfig::from_file(&path).unwrap();
    assert!(config.validate().is_err());
}
