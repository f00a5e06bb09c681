//! # SOMS Voice Service Library (soms-voice)
//!
//! Priority playback scheduler for dashboard audio.
//!
//! **Purpose:** Serialize clip requests from task announcements, polled voice
//! events and user actions onto one output device, and expose the scheduler
//! over HTTP/SSE.
//!
//! **Architecture:** [`scheduler::PlaybackScheduler`] owns the pending queue
//! and the single playback slot; [`playback::AudioSink`] plays one clip
//! (symphonia + rubato + cpal in production); [`observable`] lets UI layers
//! follow the enabled flag.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod observable;
pub mod playback;
pub mod producers;
pub mod scheduler;

pub use error::{Error, Result};
pub use observable::{Observable, Subscription};
pub use scheduler::{EnqueueOutcome, PlaybackScheduler, SchedulerOptions, SchedulerStatus};
