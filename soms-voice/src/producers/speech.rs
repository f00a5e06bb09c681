//! Speech synthesis client
//!
//! Wraps the backend voice endpoints that return a freshly rendered clip.
//! Used as async producers for [`PlaybackScheduler::enqueue_from_async_producer`].

use super::endpoint;
use crate::error::Result;
use crate::scheduler::PlaybackScheduler;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use soms_common::{AudioPriority, MediaRef};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Acknowledgement lines spoken when a user accepts a task
pub const ACCEPT_PHRASES: [&str; 3] = [
    "承知しました。よろしくお願いします。",
    "ありがとうございます。期待しています。",
    "さすがですね。頼りにしています。",
];

/// Pick one acknowledgement line at random
pub fn random_accept_phrase() -> &'static str {
    ACCEPT_PHRASES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(ACCEPT_PHRASES[0])
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AudioUrlResponse {
    #[serde(default)]
    audio_url: Option<String>,
}

/// Client for the backend voice endpoints
#[derive(Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpeechClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Render `text` to a clip.
    ///
    /// `Ok(None)` when the backend answers with a non-success status or
    /// without an `audio_url`.
    pub async fn synthesize(&self, text: &str) -> Result<Option<MediaRef>> {
        let url = endpoint(&self.base_url, "/api/voice/synthesize");
        debug!("Synthesizing {} chars via {}", text.chars().count(), url);

        let response = self
            .http
            .post(&url)
            .json(&SynthesizeRequest { text })
            .send()
            .await?;
        self.read_audio_url(response).await
    }

    /// Fetch a random pre-rendered rejection clip
    pub async fn random_rejection(&self) -> Result<Option<MediaRef>> {
        let url = endpoint(&self.base_url, "/api/voice/rejection/random");
        let response = self.http.get(&url).send().await?;
        self.read_audio_url(response).await
    }

    async fn read_audio_url(&self, response: reqwest::Response) -> Result<Option<MediaRef>> {
        let status = response.status();
        if !status.is_success() {
            warn!("Voice endpoint {} returned {}", response.url(), status);
            return Ok(None);
        }

        let body: AudioUrlResponse = response.json().await?;
        Ok(body
            .audio_url
            .filter(|url| !url.is_empty())
            .map(|url| MediaRef::new(url).resolve_against(&self.base_url)))
    }

    /// Speak `text` once synthesis completes.
    ///
    /// Returns `None` without contacting the backend when audio is disabled.
    pub fn speak(
        &self,
        scheduler: &PlaybackScheduler,
        text: impl Into<String>,
        priority: AudioPriority,
    ) -> Option<JoinHandle<()>> {
        let client = self.clone();
        let text = text.into();
        scheduler.enqueue_from_async_producer(
            async move { client.synthesize(&text).await },
            priority,
        )
    }

    /// Play a random rejection clip at user-action priority
    pub fn play_rejection(&self, scheduler: &PlaybackScheduler) -> Option<JoinHandle<()>> {
        let client = self.clone();
        scheduler.enqueue_from_async_producer(
            async move { client.random_rejection().await },
            AudioPriority::UserAction,
        )
    }
}
