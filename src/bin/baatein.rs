//! Voice agent server.
//!
//! Usage: `baatein [config.toml]`. Without an argument the default config
//! path is used when it exists; otherwise built-in defaults apply.
//! `BAATEIN_API_KEY` fills any service key left empty.

use baatein::config::SpeechConfig;
use baatein::server;
use baatein::session::Services;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let services = Services::from_config(&config)
        .map_err(|e| anyhow::anyhow!("failed to build service clients: {e}"))?;

    tracing::info!(
        addr = %config.server.bind_addr,
        llm = %config.llm.api_model,
        stt = %config.stt.model,
        tts = %config.tts.model,
        "baatein starting"
    );
    if config.llm.api_key.is_empty() {
        tracing::warn!("no API key configured; set BAATEIN_API_KEY");
    }

    server::serve(config, services, shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "server exited with error");
            anyhow::anyhow!("baatein failed: {e}")
        })?;

    tracing::info!("baatein shut down cleanly");
    Ok(())
}

fn load_config() -> anyhow::Result<SpeechConfig> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(SpeechConfig::default_config_path);

    let mut config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        SpeechConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        SpeechConfig::default()
    };
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
