//! Playback primitive used by the scheduler
//!
//! A sink plays exactly one clip per `play` call. The returned future
//! resolves when the clip ends and fails on any load, decode or device
//! error. Dropping the future stops playback and releases the output device,
//! but only once the runtime gets to drop it; `stop` does the same
//! immediately from synchronous code.

mod device;

pub use device::DeviceSink;

use crate::error::Result;
use async_trait::async_trait;
use soms_common::MediaRef;
use tracing::info;

/// Audio output port
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Sink identifier for logs
    fn name(&self) -> &'static str;

    /// Play one clip to completion
    async fn play(&self, media: &MediaRef) -> Result<()>;

    /// Silence the clip currently playing, if any, before returning.
    fn stop(&self);
}

/// Sink for hosts without an output device
///
/// Logs each clip and reports it finished immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn play(&self, media: &MediaRef) -> Result<()> {
        info!("Audio output disabled, skipping {}", media);
        Ok(())
    }

    fn stop(&self) {}
}
