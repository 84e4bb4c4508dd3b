//! The browser-facing server end to end, over real HTTP and websocket.

use crate::helpers::{FakeSearch, ScriptedLlm, ScriptedTranscriber, services};
use baatein::config::SpeechConfig;
use baatein::runtime::RuntimeEvent;
use baatein::server::{self, PLACEHOLDER_HTML};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type ClientSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start(ui_dir: &Path, transcripts: Vec<&str>, answer: Vec<&str>) -> SocketAddr {
    let mut config = SpeechConfig::default();
    config.server.ui_dist_dir = ui_dir.to_path_buf();
    let services = services(
        ScriptedLlm::new(vec![answer]),
        FakeSearch::new(Duration::from_millis(10)),
        ScriptedTranscriber::new(transcripts),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(config, services);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_event(ws: &mut ClientSocket) -> RuntimeEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn index_falls_back_to_placeholder_until_built() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start(dir.path(), Vec::new(), Vec::new()).await;

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, PLACEHOLDER_HTML);

    std::fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets").join("app.js"), "console.log(1)").unwrap();

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "<html>app</html>");

    let asset = reqwest::get(format!("http://{addr}/assets/app.js"))
        .await
        .unwrap();
    assert!(asset.status().is_success());
    assert_eq!(asset.text().await.unwrap(), "console.log(1)");

    let favicon = reqwest::get(format!("http://{addr}/favicon.ico"))
        .await
        .unwrap();
    assert!(favicon.status().is_success());
}

#[tokio::test]
async fn websocket_session_runs_a_spoken_turn() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start(
        dir.path(),
        vec!["what is", "photosynthesis"],
        vec!["Plants make food from light. ", "Neat."],
    )
    .await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut ws).await,
        RuntimeEvent::Transcript {
            text: "what is".into()
        }
    );
    assert_eq!(
        next_event(&mut ws).await,
        RuntimeEvent::Transcript {
            text: "photosynthesis".into()
        }
    );

    ws.send(Message::Text(r#"{"type":"user_stopped_speaking"}"#.into()))
        .await
        .unwrap();

    let mut events = Vec::new();
    loop {
        let event = next_event(&mut ws).await;
        let done = matches!(event, RuntimeEvent::TtsDone { .. });
        events.push(event);
        if done {
            break;
        }
    }

    assert_eq!(
        events[0],
        RuntimeEvent::FinalTranscript {
            text: "what is photosynthesis".into()
        }
    );
    assert_eq!(events[1], RuntimeEvent::TtsStart);
    let chunks: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::AudioChunk { chunk_num, .. } => Some(*chunk_num),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec![1, 2]);
    assert!(events.contains(&RuntimeEvent::LlmDone));

    ws.close(None).await.unwrap();
}
