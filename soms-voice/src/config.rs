//! Configuration for the voice service
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (with `SOMS_VOICE_PORT` / `SOMS_BACKEND_URL`
//!    environment fallbacks)
//! 2. TOML configuration file (see [`soms_common::config`])
//! 3. Built-in defaults

use crate::error::Result;
use crate::scheduler::{SchedulerOptions, MAX_QUEUE_SIZE};
use clap::Parser;
use serde::Deserialize;
use soms_common::config::{load_toml_or_default, resolve_config_path};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Config file name looked up in the standard locations
pub const CONFIG_FILE_NAME: &str = "voice.toml";

/// Command-line arguments for soms-voice
#[derive(Parser, Debug, Default)]
#[command(name = "soms-voice")]
#[command(about = "Audio playback service for the SOMS dashboard")]
#[command(version)]
pub struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SOMS_VOICE_PORT")]
    pub port: Option<u16>,

    /// Backend base URL for tasks, voice events and speech synthesis
    #[arg(short, long, env = "SOMS_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Output device name (system default when omitted)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Log clips instead of playing them
    #[arg(long)]
    pub no_audio: bool,

    /// Start with playback enabled
    #[arg(long)]
    pub enabled: bool,
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,
    pub backend_url: String,
    /// Pending queue bound
    pub max_queue_size: usize,
    pub start_enabled: bool,
    pub audio_device: Option<String>,
    pub no_audio: bool,
    pub task_poll_interval_ms: u64,
    pub voice_poll_interval_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5750,
            backend_url: "http://localhost:8000".to_string(),
            max_queue_size: MAX_QUEUE_SIZE,
            start_enabled: false,
            audio_device: None,
            no_audio: false,
            task_poll_interval_ms: 5000,
            voice_poll_interval_ms: 3000,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub port: u16,
    pub backend_url: String,
    pub max_queue_size: usize,
    pub start_enabled: bool,
    pub audio_device: Option<String>,
    pub no_audio: bool,
    pub task_poll_interval: Duration,
    pub voice_poll_interval: Duration,
    pub log_level: String,
}

impl VoiceConfig {
    /// Locate and load the TOML file, then apply command-line overrides
    pub fn resolve(args: &Args) -> Result<Self> {
        let path = resolve_config_path(args.config.as_deref(), CONFIG_FILE_NAME);
        if let Some(path) = &path {
            info!("Loading config from {}", path.display());
        }
        let toml: TomlConfig = load_toml_or_default(path.as_deref())?;
        Ok(Self::from_parts(args, toml))
    }

    /// Merge command-line arguments over file settings
    pub fn from_parts(args: &Args, toml: TomlConfig) -> Self {
        Self {
            port: args.port.unwrap_or(toml.port),
            backend_url: args
                .backend_url
                .clone()
                .unwrap_or(toml.backend_url)
                .trim_end_matches('/')
                .to_string(),
            max_queue_size: toml.max_queue_size.max(1),
            start_enabled: args.enabled || toml.start_enabled,
            audio_device: args.device.clone().or(toml.audio_device),
            no_audio: args.no_audio || toml.no_audio,
            task_poll_interval: Duration::from_millis(toml.task_poll_interval_ms.max(100)),
            voice_poll_interval: Duration::from_millis(toml.voice_poll_interval_ms.max(100)),
            log_level: toml.logging.level,
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_queue_size: self.max_queue_size,
            start_enabled: self.start_enabled,
        }
    }

    /// Default tracing filter when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> String {
        format!(
            "soms_voice={level},soms_common={level},tower_http={level}",
            level = self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file_or_args() {
        let config = VoiceConfig::from_parts(&Args::default(), TomlConfig::default());

        assert_eq!(config.port, 5750);
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.max_queue_size, 20);
        assert!(!config.start_enabled);
        assert!(!config.no_audio);
        assert_eq!(config.task_poll_interval, Duration::from_millis(5000));
        assert_eq!(config.voice_poll_interval, Duration::from_millis(3000));
        assert_eq!(
            config.default_log_filter(),
            "soms_voice=info,soms_common=info,tower_http=info"
        );
    }

    #[test]
    fn test_args_override_file() {
        let toml: TomlConfig = toml::from_str(
            r#"
            port = 6000
            backend_url = "http://backend:8000"
            audio_device = "speakers"
            "#,
        )
        .unwrap();
        let args = Args {
            port: Some(7000),
            backend_url: Some("http://other:9000/".to_string()),
            enabled: true,
            ..Default::default()
        };

        let config = VoiceConfig::from_parts(&args, toml);

        assert_eq!(config.port, 7000);
        assert_eq!(config.backend_url, "http://other:9000");
        assert_eq!(config.audio_device.as_deref(), Some("speakers"));
        assert!(config.start_enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml: TomlConfig = toml::from_str(
            r#"
            max_queue_size = 5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = VoiceConfig::from_parts(&Args::default(), toml);

        assert_eq!(config.max_queue_size, 5);
        assert_eq!(config.port, 5750);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scheduler_options().max_queue_size, 5);
    }

    #[test]
    fn test_args_parse_flags() {
        let args = Args::try_parse_from(["soms-voice", "--no-audio", "--enabled", "-d", "USB"])
            .unwrap();
        assert!(args.no_audio);
        assert!(args.enabled);
        assert_eq!(args.device.as_deref(), Some("USB"));
    }
}
