//! Browser-facing HTTP and websocket server.
//!
//! `GET /` serves the built client, `/assets` its static files, and `GET /ws`
//! upgrades to a [`Session`] socket. Each socket gets its own session and
//! conversation record.

use crate::config::SpeechConfig;
use crate::error::Result;
use crate::pipeline::EventSink;
use crate::session::{Services, Session};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::services::ServeDir;
use tracing::{debug, info};
use uuid::Uuid;

/// Served at `/` until the client has been built.
pub const PLACEHOLDER_HTML: &str = "<h1>Building UI... please wait</h1>";

#[derive(Clone)]
struct AppState {
    services: Services,
    config: Arc<SpeechConfig>,
}

/// Build the application router.
pub fn router(config: SpeechConfig, services: Services) -> Router {
    let assets = ServeDir::new(config.server.ui_dist_dir.join("assets"));
    let state = AppState {
        services,
        config: Arc::new(config),
    };
    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(favicon))
        .route("/ws", get(ws_handler))
        .nest_service("/assets", assets)
        .with_state(state)
}

/// Bind `config.server.bind_addr` and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve<F>(config: SpeechConfig, services: Services, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(config, services))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let path = state.config.server.ui_dist_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html),
        Err(e) => {
            debug!(path = %path.display(), "client not built: {e}");
            Html(PLACEHOLDER_HTML.to_owned())
        }
    }
}

async fn favicon() -> impl IntoResponse {}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    info!(session = %id, "client connected");
    let (mut sender, mut receiver) = socket.split();
    let (sink, events) = EventSink::channel();
    let session = Arc::new(Session::new(id, &state.services, &state.config, sink));

    let writer = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(events)
            .map(|event| Ok::<_, axum::Error>(Message::Text(event.to_json().into())));
        if let Err(e) = sender.send_all(&mut outbound).await {
            debug!(session = %id, "client send failed: {e}");
        }
    });

    let incoming = async_stream::stream! {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => yield text.as_str().to_owned(),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(session = %id, "client socket error: {e}");
                    break;
                }
            }
        }
    };

    session.run(Box::pin(incoming)).await;
    writer.abort();
    info!(session = %id, "client disconnected");
}
