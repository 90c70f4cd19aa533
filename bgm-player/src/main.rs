//! BGM Player (bgm-player) - Main entry point
//!
//! Picks one configured music source at startup, prepares it while idle,
//! starts playback after an optional delay, and stops on Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bgm_common::config::{resolve_config_path, MusicOverrides, TomlConfig};
use bgm_common::select_source;
use bgm_player::backends::{ProcessPlayer, YtDlp};
use bgm_player::capabilities::BundledToolProvider;
use bgm_player::pipeline::PipelineSettings;
use bgm_player::tools::{BundledDir, ToolLocator, ToolSpec};
use bgm_player::{AudioOrchestrator, Capabilities};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bgm-player
#[derive(Parser, Debug)]
#[command(name = "bgm-player")]
#[command(about = "Background music player: stream, resolve, or loop a local file")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "BGM_CONFIG")]
    config: Option<PathBuf>,

    /// Direct stream URL (overrides [music].stream_url)
    #[arg(long)]
    stream_url: Option<String>,

    /// Media-hosting page URL (overrides [music].media_reference_url)
    #[arg(long)]
    media_reference: Option<String>,

    /// Local audio file (overrides [music].local_fallback_path)
    #[arg(long)]
    local_path: Option<PathBuf>,

    /// Download and loop media references instead of streaming them
    #[arg(long)]
    download: bool,

    /// Seconds to wait between preparing and starting playback
    #[arg(long, default_value = "0", env = "BGM_DELAY_SECS")]
    delay_secs: u64,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "BGM_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing: RUST_LOG > --log-level > [logging].level
    let fallback_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bgm_player={0},bgm_common={0}", fallback_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BGM Player v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using built-in defaults"),
    }

    config.music.apply_overrides(MusicOverrides {
        stream_url: args.stream_url,
        media_reference_url: args.media_reference,
        local_fallback_path: args.local_path,
        prefer_download: args.download.then_some(true),
    });

    let orchestrator = Arc::new(build_orchestrator(&config));

    let Some(source) = select_source(&config.music) else {
        warn!("No music source configured; nothing to play");
        return Ok(());
    };
    info!("Selected music source: {}", source);

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(event = event.event_type(), "{:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Err(e) = orchestrator.prepare_source(&source) {
        warn!("Could not prepare {}: {}", source, e);
    }

    if args.delay_secs > 0 {
        info!("Starting playback in {}s", args.delay_secs);
        tokio::time::sleep(Duration::from_secs(args.delay_secs)).await;
    }

    // A returned background task is fire-and-forget; failures are logged by the worker
    match orchestrator.play_source(&source, config.music.prefer_download) {
        Ok(_task) => info!("Playback requested for {}", source),
        Err(e) => error!(kind = %e.kind(), "Failed to start playback: {}", e),
    }

    shutdown_signal().await;
    orchestrator.stop();

    info!("BGM Player shutdown complete");
    Ok(())
}

/// Wire the process-backed engines into an orchestrator
fn build_orchestrator(config: &TomlConfig) -> AudioOrchestrator {
    let bundled: Option<Arc<dyn BundledToolProvider>> = config
        .tools
        .bundled_dir
        .as_ref()
        .map(|dir| Arc::new(BundledDir::new(dir)) as Arc<dyn BundledToolProvider>);

    let locator = |spec: ToolSpec| {
        let locator = ToolLocator::new(spec);
        Arc::new(match &bundled {
            Some(provider) => locator.with_bundled(Arc::clone(provider)),
            None => locator,
        })
    };

    let transcoder = locator(ToolSpec::ffmpeg().with_override_env(&config.tools.ffmpeg_override_env));
    let player = locator(ToolSpec::ffplay());
    let ytdlp = Arc::new(YtDlp::new(locator(ToolSpec::ytdlp())));

    let capabilities = Capabilities {
        local: Arc::new(ProcessPlayer::new(Arc::clone(&player))),
        stream: Arc::new(ProcessPlayer::new(player)),
        resolver: ytdlp.clone(),
        downloader: ytdlp,
        transcoder,
    };

    AudioOrchestrator::new(capabilities, PipelineSettings::from(&config.transcode))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
