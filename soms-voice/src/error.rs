//! Error types for soms-voice
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! None of these reach producers: the scheduler logs and publishes them.

use thiserror::Error;

/// Main error type for the voice service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Fetching media or calling a backend endpoint failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback errors reported by a sink
    #[error("Playback error: {0}")]
    Playback(String),

    /// An async producer could not supply a clip
    #[error("Producer error: {0}")]
    Producer(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from shared library code
    #[error(transparent)]
    Common(#[from] soms_common::Error),
}

/// Convenience Result type using soms-voice Error
pub type Result<T> = std::result::Result<T, Error>;
