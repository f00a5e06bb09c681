//! SOMS voice service (soms-voice) - Main entry point
//!
//! Runs the playback scheduler, the background producers that feed it, and
//! the HTTP control API. Everything shares one current-thread runtime.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use soms_common::events::EventBus;
use soms_voice::api::{self, AppContext};
use soms_voice::config::{Args, VoiceConfig};
use soms_voice::logging;
use soms_voice::playback::{AudioSink, DeviceSink, NullSink};
use soms_voice::producers::{AnnouncementWatcher, SpeechClient, VoiceEventPoller};
use soms_voice::scheduler::PlaybackScheduler;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing before config discovery so it can log
    let log = logging::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = VoiceConfig::resolve(&args).context("Failed to load configuration")?;
    if let Err(e) = log.apply(&config.default_log_filter()) {
        warn!("Keeping startup log filter: {}", e);
    }

    info!("Starting SOMS voice service on port {}", config.port);
    info!("Backend: {}", config.backend_url);

    let http = DeviceSink::default_client().context("Failed to build HTTP client")?;

    let sink: Arc<dyn AudioSink> = if config.no_audio {
        warn!("Audio output disabled, clips will only be logged");
        Arc::new(NullSink)
    } else {
        Arc::new(DeviceSink::new(http.clone(), config.audio_device.clone()))
    };

    let scheduler = PlaybackScheduler::new(sink, EventBus::default(), config.scheduler_options())
        .context("Failed to initialize playback scheduler")?;
    info!(
        "Playback scheduler initialized (audio {})",
        if scheduler.is_enabled() { "enabled" } else { "disabled" }
    );

    // Background producers
    tokio::spawn(
        AnnouncementWatcher::new(
            http.clone(),
            config.backend_url.clone(),
            scheduler.clone(),
            config.task_poll_interval,
        )
        .run(),
    );
    tokio::spawn(
        VoiceEventPoller::new(
            http.clone(),
            config.backend_url.clone(),
            scheduler.clone(),
            config.voice_poll_interval,
        )
        .run(),
    );

    let ctx = AppContext {
        scheduler: scheduler.clone(),
        speech: SpeechClient::new(http, config.backend_url.clone()),
        port: config.port,
    };

    api::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the in-flight clip and release the device
    scheduler.set_enabled(false);

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
