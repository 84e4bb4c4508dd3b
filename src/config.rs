//! Configuration types for the voice agent.

use crate::error::{Result, SpeechError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the shared service subscription key.
pub const API_KEY_ENV: &str = "BAATEIN_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Browser-facing HTTP/websocket server settings.
    pub server: ServerConfig,
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Token-generation settings.
    pub llm: LlmConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Web search settings.
    pub search: SearchSettings,
    /// Turn orchestration tuning.
    pub pipeline: PipelineConfig,
}

/// Browser-facing server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Directory holding the built browser client (`index.html` + `assets/`).
    pub ui_dist_dir: PathBuf,
    /// Interval between keep-alive `ping` events to the browser.
    pub keep_alive_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_owned(),
            ui_dist_dir: PathBuf::from("ui/dist"),
            keep_alive_interval_ms: 15_000,
        }
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Streaming recognition websocket endpoint (without query string).
    pub ws_url: String,
    /// Subscription key sent as `Api-Subscription-Key`.
    pub api_key: String,
    /// Recognition model.
    pub model: String,
    /// Recognition mode.
    pub mode: String,
    /// BCP-47 language code.
    pub language_code: String,
    /// Codec of the PCM audio relayed from the browser.
    pub input_audio_codec: String,
    /// Sample rate of the relayed audio in Hz.
    pub sample_rate: u32,
    /// MIME type declared on each relayed audio message.
    pub audio_encoding: String,
    /// Whether the service should use its high-sensitivity VAD.
    pub high_vad_sensitivity: bool,
    /// Websocket ping interval for the recognition connection.
    pub ping_interval_ms: u64,
    /// Delay before retrying after a failed connect.
    pub connect_retry_ms: u64,
    /// Delay before reconnecting after an established stream drops.
    pub reconnect_delay_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.sarvam.ai/speech-to-text/ws".to_owned(),
            api_key: String::new(),
            model: "saaras:v3".to_owned(),
            mode: "transcribe".to_owned(),
            language_code: "en-IN".to_owned(),
            input_audio_codec: "pcm_s16le".to_owned(),
            sample_rate: 16_000,
            audio_encoding: "audio/wav".to_owned(),
            high_vad_sensitivity: true,
            ping_interval_ms: 20_000,
            connect_retry_ms: 1_000,
            reconnect_delay_ms: 500,
        }
    }
}

/// Token-generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions endpoint (OpenAI-compatible, SSE streaming).
    pub api_url: String,
    /// Model name to request.
    pub api_model: String,
    /// Subscription key sent as `Api-Subscription-Key`.
    pub api_key: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum idle keep-alive connections kept in the pool.
    pub max_idle_connections: usize,
    /// Drop `<think>...</think>` reasoning blocks from streamed output.
    pub strip_think_tags: bool,
    /// Fixed system message placed at the head of every conversation.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sarvam.ai/v1/chat/completions".to_owned(),
            api_model: "sarvam-m".to_owned(),
            api_key: String::new(),
            connect_timeout_secs: 30,
            max_idle_connections: 5,
            strip_think_tags: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Streaming synthesis websocket endpoint.
    pub ws_url: String,
    /// Subscription key sent as `Api-Subscription-Key`.
    pub api_key: String,
    /// Synthesis model.
    pub model: String,
    /// Target language code.
    pub target_language_code: String,
    /// Voice name.
    pub speaker: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.sarvam.ai/text-to-speech/ws".to_owned(),
            api_key: String::new(),
            model: "bulbul:v3".to_owned(),
            target_language_code: "en-IN".to_owned(),
            speaker: "shubh".to_owned(),
        }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of hits summarised for the model.
    pub max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search.
    pub safe_search: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 3,
            timeout_seconds: 8,
            safe_search: true,
        }
    }
}

impl SearchSettings {
    /// Build the search crate's request configuration.
    pub fn to_search_config(&self) -> baatein_search::SearchConfig {
        baatein_search::SearchConfig {
            max_results: self.max_results,
            timeout_seconds: self.timeout_seconds,
            safe_search: self.safe_search,
            ..Default::default()
        }
    }
}

/// Turn orchestration tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Characters of first-leg output held back before committing to a
    /// direct answer (unless a sentence terminator arrives first).
    pub lookahead_chars: usize,
    /// Minimum word-set Jaccard similarity for adopting the speculative
    /// search result.
    pub similarity_threshold: f64,
    /// Upper bound on waiting for the speculative search to finish.
    pub speculative_search_timeout_ms: u64,
    /// Poll interval of the synthesis queue reader.
    pub queue_poll_interval_ms: u64,
    /// How long a new turn waits for the previous one to unwind before
    /// aborting it.
    pub unwind_timeout_ms: u64,
    /// Pause before the search-grounded leg so the browser can reset its
    /// media pipeline.
    pub search_leg_pause_ms: u64,
    /// Opening token of the search directive.
    pub directive_open: String,
    /// Closing token of the search directive.
    pub directive_close: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookahead_chars: 80,
            similarity_threshold: 0.4,
            speculative_search_timeout_ms: 5_000,
            queue_poll_interval_ms: 500,
            unwind_timeout_ms: 3_000,
            search_leg_pause_ms: 700,
            directive_open: "[SEARCH:".to_owned(),
            directive_close: "]".to_owned(),
        }
    }
}

impl PipelineConfig {
    /// Speculative search join bound.
    pub fn speculative_search_timeout(&self) -> Duration {
        Duration::from_millis(self.speculative_search_timeout_ms)
    }

    /// Synthesis queue poll interval.
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    /// Previous-turn unwind bound.
    pub fn unwind_timeout(&self) -> Duration {
        Duration::from_millis(self.unwind_timeout_ms)
    }

    /// Pause before the search-grounded leg.
    pub fn search_leg_pause(&self) -> Duration {
        Duration::from_millis(self.search_leg_pause_ms)
    }

    /// Reject values that would stall or short-circuit the turn logic.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.lookahead_chars == 0 {
            return Err(SpeechError::Config(
                "pipeline.lookahead_chars must be greater than 0".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SpeechError::Config(
                "pipeline.similarity_threshold must be within [0, 1]".to_owned(),
            ));
        }
        if self.queue_poll_interval_ms == 0 {
            return Err(SpeechError::Config(
                "pipeline.queue_poll_interval_ms must be greater than 0".to_owned(),
            ));
        }
        if self.speculative_search_timeout_ms == 0 || self.unwind_timeout_ms == 0 {
            return Err(SpeechError::Config(
                "pipeline timeouts must be greater than 0".to_owned(),
            ));
        }
        if self.directive_open.is_empty() || self.directive_close.is_empty() {
            return Err(SpeechError::Config(
                "pipeline directive markers must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

impl SpeechConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SpeechError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SpeechError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/baatein/config.toml`.
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("baatein").join("config.toml"),
            None => PathBuf::from("/tmp/baatein-config/config.toml"),
        }
    }

    /// Fill empty service keys from [`API_KEY_ENV`].
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.apply_api_key(&key);
        }
    }

    fn apply_api_key(&mut self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        for slot in [
            &mut self.llm.api_key,
            &mut self.stt.api_key,
            &mut self.tts.api_key,
        ] {
            if slot.is_empty() {
                *slot = key.to_owned();
            }
        }
    }

    /// Validate every section that has constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::Config`] for the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.search.to_search_config().validate()?;
        Ok(())
    }
}

/// Persona and search protocol for the generation model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Baatein, a friendly voice assistant designed for natural spoken conversation.

<communication_style>
- Use warm, conversational tone suited for voice interaction
- Use natural sentence structures; avoid bullet points unless necessary
- Provide helpful, complete answers with sufficient detail
- Avoid emojis, excessive formatting, or visual elements
- Start directly with the answer; avoid filler like \"Here is the answer\"
</communication_style>

<core_capability>
You have access to a web search tool that retrieves current, real-time information from the internet.
</core_capability>

<decision_framework>
Before responding, categorize the query:

ANSWER DIRECTLY (no search needed):
- Established facts: historical events, scientific principles, geographic facts
- Conceptual explanations: \"how does X work\", \"what is Y\", \"explain Z\"
- Timeless knowledge: biographical facts about historical figures, cultural information
- Definitions and general knowledge you're confident about

SEARCH REQUIRED (must use web search):
- ANY temporal indicators: \"today\", \"now\", \"current\", \"latest\", \"recent\", \"yesterday\", \"this week\", \"live\", \"right now\"
- Real-time data: weather, stock prices, sports scores, exchange rates
- Current status: \"who is the [current position]\", \"is X still happening\"
- Recent events: news, updates, developments since your knowledge cutoff
- When you're uncertain if information may have changed
</decision_framework>

<search_protocol>
When search is required:
1. Output ONLY this format on a single line: [SEARCH: concise search query]
2. Do not add any preamble, explanation, or additional text
3. Keep queries focused and specific (2-6 words typically optimal)
4. After receiving results, synthesize information naturally in your response

Example:
User: \"What's the weather in Mumbai today?\"
Assistant: [SEARCH: Mumbai weather today]
</search_protocol>
";
