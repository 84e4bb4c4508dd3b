//! Streaming chat-completions client against a mock server.

use baatein::config::LlmConfig;
use baatein::conversation::ConversationMessage;
use baatein::llm::{ApiLlm, TokenGenerator};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(increments: &[&str]) -> String {
    let mut body = String::new();
    for text in increments {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": text}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn client(server: &MockServer, strip_think_tags: bool) -> ApiLlm {
    ApiLlm::new(&LlmConfig {
        api_url: format!("{}/v1/chat/completions", server.uri()),
        api_key: "test-key".to_owned(),
        strip_think_tags,
        ..LlmConfig::default()
    })
    .unwrap()
}

fn history() -> Vec<ConversationMessage> {
    vec![
        ConversationMessage::system("sys"),
        ConversationMessage::user("Hello"),
    ]
}

async fn collect(llm: &ApiLlm, cancel: CancellationToken) -> Vec<String> {
    llm.stream(history(), cancel).collect().await
}

async fn mount_body(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn streams_increments_with_key_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("api-subscription-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "sarvam-m",
            "stream": true,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse(&["Hi", " there", "!"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = collect(&client(&server, true), CancellationToken::new()).await;
    assert_eq!(tokens, vec!["Hi", " there", "!"]);
}

#[tokio::test]
async fn malformed_and_empty_increments_are_skipped() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\ndata: {{not json\n\n{}",
        sse(&["", "One", "Two"])
    );
    mount_body(&server, body).await;

    let tokens = collect(&client(&server, true), CancellationToken::new()).await;
    assert_eq!(tokens, vec!["One", "Two"]);
}

#[tokio::test]
async fn nothing_after_done_is_yielded() {
    let server = MockServer::start().await;
    let body = format!("{}{}", sse(&["Only"]), sse(&["Ignored"]));
    mount_body(&server, body).await;

    let tokens = collect(&client(&server, true), CancellationToken::new()).await;
    assert_eq!(tokens, vec!["Only"]);
}

#[tokio::test]
async fn think_blocks_are_removed() {
    let server = MockServer::start().await;
    mount_body(
        &server,
        sse(&["<think>The user", " wants weather.</think>", "[SEARCH: Mumbai weather]"]),
    )
    .await;

    let text: String = collect(&client(&server, true), CancellationToken::new())
        .await
        .concat();
    assert_eq!(text, "[SEARCH: Mumbai weather]");
}

#[tokio::test]
async fn think_blocks_pass_through_when_disabled() {
    let server = MockServer::start().await;
    mount_body(&server, sse(&["<think>x</think>", "Answer."])).await;

    let text: String = collect(&client(&server, false), CancellationToken::new())
        .await
        .concat();
    assert_eq!(text, "<think>x</think>Answer.");
}

#[tokio::test]
async fn error_status_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let tokens = collect(&client(&server, true), CancellationToken::new()).await;
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn unreachable_service_yields_nothing() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let llm = ApiLlm::new(&LlmConfig {
        api_url: format!("http://{addr}/v1/chat/completions"),
        ..LlmConfig::default()
    })
    .unwrap();

    let tokens = collect(&llm, CancellationToken::new()).await;
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn cancelled_before_request_yields_nothing() {
    let server = MockServer::start().await;
    mount_body(&server, sse(&["Hi"])).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let tokens = collect(&client(&server, true), cancel).await;
    assert!(tokens.is_empty());
}
