//! Streaming synthesis over websocket.
//!
//! Protocol: after connecting the client sends one `config` message, then
//! any number of `text` and `flush` messages. The service answers with
//! `audio` messages carrying base64 audio and, once everything requested
//! has been spoken, an `event` message with `event_type: "final"`.

use super::{SpeechSynthesizer, SynthesisSession};
use crate::config::TtsConfig;
use crate::error::{Result, SpeechError};
use crate::pipeline::messages::{SynthesisCommand, SynthesisEvent};
use crate::ws_client::{self, ServiceSocket};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum TtsRequest<'a> {
    Config {
        target_language_code: &'a str,
        speaker: &'a str,
    },
    Text {
        text: &'a str,
    },
    Flush,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum TtsResponse {
    Audio { audio: String },
    Event { event_type: String },
    Error { message: String },
}

fn encode(request: &TtsRequest<'_>) -> Result<Message> {
    serde_json::to_string(request)
        .map(Message::Text)
        .map_err(|e| SpeechError::Tts(format!("encode request: {e}")))
}

/// [`SpeechSynthesizer`] backed by the streaming synthesis websocket.
#[derive(Debug, Clone)]
pub struct WsSynthesizer {
    config: TtsConfig,
}

impl WsSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SpeechSynthesizer for WsSynthesizer {
    async fn open(&self) -> Result<SynthesisSession> {
        let url = ws_client::service_url(
            &self.config.ws_url,
            &[
                ("model", self.config.model.as_str()),
                ("send_completion_event", "true"),
            ],
        )
        .map_err(SpeechError::Tts)?;
        let mut socket = ws_client::connect(&url, &self.config.api_key)
            .await
            .map_err(SpeechError::Tts)?;

        let config = encode(&TtsRequest::Config {
            target_language_code: &self.config.target_language_code,
            speaker: &self.config.speaker,
        })?;
        socket
            .send(config)
            .await
            .map_err(|e| SpeechError::Tts(format!("send config: {e}")))?;
        debug!(speaker = %self.config.speaker, "synthesis session opened");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(socket, command_rx, event_tx));
        Ok(SynthesisSession::new(command_tx, event_rx).with_task(task))
    }
}

/// Relay commands to the socket and service messages back as events until
/// the final marker, a socket error, or both channel ends close.
async fn run_session(
    socket: ServiceSocket,
    mut commands: mpsc::UnboundedReceiver<SynthesisCommand>,
    events: mpsc::UnboundedSender<SynthesisEvent>,
) {
    let (mut write, mut read) = socket.split();
    let mut commands_open = true;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Some(event) = decode(&text) else {
                        continue;
                    };
                    let is_final = event == SynthesisEvent::Final;
                    if events.send(event).is_err() || is_final {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("synthesis socket closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("synthesis socket error: {e}");
                    break;
                }
                _ => {}
            },
            command = commands.recv(), if commands_open => {
                let request = match &command {
                    Some(SynthesisCommand::Convert(text)) => TtsRequest::Text { text },
                    Some(SynthesisCommand::Flush) => TtsRequest::Flush,
                    None => {
                        commands_open = false;
                        continue;
                    }
                };
                let sent = match encode(&request) {
                    Ok(message) => write.send(message).await,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                if let Err(e) = sent {
                    warn!("synthesis send failed: {e}");
                    break;
                }
            }
        }
    }

    let _ = write.close().await;
}

fn decode(text: &str) -> Option<SynthesisEvent> {
    match serde_json::from_str::<TtsResponse>(text) {
        Ok(TtsResponse::Audio { audio }) => Some(SynthesisEvent::Audio(audio)),
        Ok(TtsResponse::Event { event_type }) if event_type == "final" => {
            Some(SynthesisEvent::Final)
        }
        Ok(TtsResponse::Event { event_type }) => {
            debug!(event_type = %event_type, "synthesis event");
            None
        }
        Ok(TtsResponse::Error { message }) => {
            warn!("synthesis service error: {message}");
            None
        }
        Err(e) => {
            debug!("ignoring unparseable synthesis message: {e}");
            None
        }
    }
}
