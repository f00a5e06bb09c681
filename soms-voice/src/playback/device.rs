//! Output-device sink
//!
//! Loads a clip (HTTP(S) or local file), decodes and resamples it, then plays
//! it through cpal. Only one clip may hold the device at a time: a clip that
//! was cancelled releases the device before the next one can open it.

use super::AudioSink;
use crate::audio::output::StopHandle;
use crate::audio::{decoder, output};
use crate::error::{Error, Result};
use async_trait::async_trait;
use soms_common::MediaRef;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

type StopSlot = std::sync::Mutex<Option<StopHandle>>;

/// Sink that plays clips on a local audio output device
pub struct DeviceSink {
    http: reqwest::Client,
    device_name: Option<String>,
    device_lock: Mutex<()>,
    playing: StopSlot,
}

/// Empties the stop slot when the play future ends or is dropped, so the
/// output thread sees its last sender go away
struct PlayingGuard<'a>(&'a StopSlot);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl DeviceSink {
    /// `device_name` of `None` selects the system default output.
    pub fn new(http: reqwest::Client, device_name: Option<String>) -> Self {
        Self {
            http,
            device_name,
            device_lock: Mutex::new(()),
            playing: StopSlot::new(None),
        }
    }

    /// Default HTTP client for fetching clips
    pub fn default_client() -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?)
    }

    /// Fetch the raw bytes of a clip
    async fn load(&self, media: &MediaRef) -> Result<Vec<u8>> {
        if media.is_remote() {
            let response = self
                .http
                .get(media.as_str())
                .send()
                .await?
                .error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        } else {
            let locator = media.as_str();
            let path = locator.strip_prefix("file://").unwrap_or(locator);
            Ok(tokio::fs::read(path).await?)
        }
    }
}

#[async_trait]
impl AudioSink for DeviceSink {
    fn name(&self) -> &'static str {
        "device"
    }

    async fn play(&self, media: &MediaRef) -> Result<()> {
        let _device = self.device_lock.lock().await;

        let bytes = self.load(media).await?;
        debug!("Loaded {} bytes from {}", bytes.len(), media);

        let extension = decoder::extension_hint(media.as_str());
        let clip = tokio::task::spawn_blocking(move || {
            decoder::decode_bytes(bytes, extension.as_deref())
        })
        .await
        .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))??;

        let playback = output::play_clip(self.device_name.clone(), clip)?;
        *self.playing.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(playback.stop_handle());
        let _playing = PlayingGuard(&self.playing);

        playback.finished().await
    }

    fn stop(&self) {
        let handle = self
            .playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            debug!("Stopping output stream");
            handle.stop();
        }
    }
}
