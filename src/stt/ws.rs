//! Recognition over the streaming speech-to-text websocket.

use super::{Transcriber, TranscriberStream};
use crate::config::SttConfig;
use crate::error::{Result, SpeechError};
use crate::ws_client::{self, ServiceSocket};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct AudioEnvelope<'a> {
    audio: AudioPayload<'a>,
}

#[derive(Debug, Serialize)]
struct AudioPayload<'a> {
    data: &'a str,
    sample_rate: u32,
    encoding: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptMessage {
    #[serde(default)]
    data: TranscriptData,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptData {
    #[serde(default)]
    transcript: String,
}

/// [`Transcriber`] backed by the streaming recognition websocket.
#[derive(Debug, Clone)]
pub struct WsTranscriber {
    config: SttConfig,
}

impl WsTranscriber {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }

    fn url(&self) -> std::result::Result<url::Url, String> {
        let vad = if self.config.high_vad_sensitivity {
            "true"
        } else {
            "false"
        };
        ws_client::service_url(
            &self.config.ws_url,
            &[
                ("model", self.config.model.as_str()),
                ("mode", self.config.mode.as_str()),
                ("language-code", self.config.language_code.as_str()),
                ("high_vad_sensitivity", vad),
                ("input_audio_codec", self.config.input_audio_codec.as_str()),
            ],
        )
    }
}

#[async_trait]
impl Transcriber for WsTranscriber {
    async fn connect(&self) -> Result<TranscriberStream> {
        let url = self.url().map_err(SpeechError::Stt)?;
        let socket = ws_client::connect(&url, &self.config.api_key)
            .await
            .map_err(SpeechError::Stt)?;
        info!("connected to speech recognition");

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_stream(
            socket,
            audio_rx,
            transcript_tx,
            self.config.clone(),
        ));
        Ok(TranscriberStream::new(audio_tx, transcript_rx).with_task(task))
    }
}

async fn run_stream(
    socket: ServiceSocket,
    mut audio: mpsc::UnboundedReceiver<String>,
    transcripts: mpsc::UnboundedSender<String>,
    config: SttConfig,
) {
    let (mut write, mut read) = socket.split();
    let mut ping = tokio::time::interval(Duration::from_millis(config.ping_interval_ms.max(1)));
    ping.tick().await;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(transcript) = parse_transcript(&text)
                        && transcripts.send(transcript).is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("speech recognition disconnected");
                    break;
                }
                Some(Err(e)) => {
                    warn!("speech recognition socket error: {e}");
                    break;
                }
                _ => {}
            },
            data = audio.recv() => {
                let Some(data) = data else {
                    break;
                };
                let Some(message) = audio_message(&data, &config) else {
                    continue;
                };
                if let Err(e) = write.send(message).await {
                    warn!("speech recognition send failed: {e}");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    warn!("speech recognition ping failed: {e}");
                    break;
                }
            }
        }
    }

    let _ = write.close().await;
}

fn audio_message(data: &str, config: &SttConfig) -> Option<Message> {
    let envelope = AudioEnvelope {
        audio: AudioPayload {
            data,
            sample_rate: config.sample_rate,
            encoding: &config.audio_encoding,
        },
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!("failed to encode audio message: {e}");
            None
        }
    }
}

/// Non-empty `data.transcript` of a service message.
fn parse_transcript(text: &str) -> Option<String> {
    let message: TranscriptMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("ignoring unparseable recognition message: {e}");
            return None;
        }
    };
    let transcript = message.data.transcript;
    (!transcript.is_empty()).then_some(transcript)
}
