//! Test helpers for soms-voice integration tests
//!
//! `ScriptedSink` stands in for the output device. Each `play` call records
//! the clip and then waits until the test finishes or fails it, so tests
//! control exactly when a playback ends. `stop` and dropping the play future
//! (the scheduler cancelling it) are both recorded as a release.

#![allow(dead_code)]

use async_trait::async_trait;
use soms_common::events::EventBus;
use soms_common::MediaRef;
use soms_voice::playback::AudioSink;
use soms_voice::scheduler::{PlaybackScheduler, SchedulerOptions};
use soms_voice::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct SinkState {
    started: Vec<String>,
    released: Vec<String>,
    controls: HashMap<String, oneshot::Sender<Result<()>>>,
    /// Clips holding the device, tagged per `play` call
    playing: Vec<(u64, String)>,
    next_play: u64,
    max_active: usize,
}

impl SinkState {
    fn release(&mut self, play: u64) {
        if let Some(pos) = self.playing.iter().position(|(id, _)| *id == play) {
            let (_, media) = self.playing.remove(pos);
            self.controls.remove(&media);
            self.released.push(media);
        }
    }
}

/// Sink whose playbacks end when the test says so
#[derive(Clone, Default)]
pub struct ScriptedSink {
    state: Arc<Mutex<SinkState>>,
    /// Complete every clip after this delay instead of waiting for the test
    auto_complete: Option<Duration>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that finishes each clip on its own after `delay`
    pub fn auto(delay: Duration) -> Self {
        Self {
            state: Arc::default(),
            auto_complete: Some(delay),
        }
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }

    pub fn active(&self) -> usize {
        self.state.lock().unwrap().playing.len()
    }

    pub fn max_active(&self) -> usize {
        self.state.lock().unwrap().max_active
    }

    /// End the playback of `media` successfully
    pub fn finish(&self, media: &str) {
        self.complete(media, Ok(()));
    }

    /// End the playback of `media` with an error
    pub fn fail(&self, media: &str) {
        self.complete(
            media,
            Err(Error::Playback(format!("scripted failure of {}", media))),
        );
    }

    fn complete(&self, media: &str, result: Result<()>) {
        let sender = self
            .state
            .lock()
            .unwrap()
            .controls
            .remove(media)
            .unwrap_or_else(|| panic!("{} is not playing", media));
        let _ = sender.send(result);
    }

    /// Wait until at least `count` clips have started
    pub async fn wait_for_started(&self, count: usize) -> Vec<String> {
        self.wait_until(|state| state.started.len() >= count).await;
        self.started()
    }

    /// Wait until `media` has been released by the scheduler
    pub async fn wait_for_release(&self, media: &str) {
        self.wait_until(|state| state.released.iter().any(|m| m == media))
            .await;
    }

    /// Wait until no clip is playing
    pub async fn wait_idle(&self) {
        self.wait_until(|state| state.playing.is_empty()).await;
    }

    async fn wait_until(&self, condition: impl Fn(&SinkState) -> bool) {
        let state = Arc::clone(&self.state);
        tokio::time::timeout(WAIT_TIMEOUT, async move {
            loop {
                {
                    let guard = state.lock().unwrap();
                    if condition(&*guard) {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for sink state");
    }
}

/// Releases the clip however the play future ends, unless `stop` already did
struct ActiveGuard {
    state: Arc<Mutex<SinkState>>,
    play: u64,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.state.lock().unwrap().release(self.play);
    }
}

#[async_trait]
impl AudioSink for ScriptedSink {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn play(&self, media: &MediaRef) -> Result<()> {
        let media = media.as_str().to_string();
        let (tx, rx) = oneshot::channel();
        let play = {
            let mut state = self.state.lock().unwrap();
            let play = state.next_play;
            state.next_play += 1;
            state.started.push(media.clone());
            state.playing.push((play, media.clone()));
            state.max_active = state.max_active.max(state.playing.len());
            if self.auto_complete.is_none() {
                state.controls.insert(media, tx);
            }
            play
        };
        let _guard = ActiveGuard {
            state: Arc::clone(&self.state),
            play,
        };

        if let Some(delay) = self.auto_complete {
            tokio::time::sleep(delay).await;
            return Ok(());
        }

        rx.await
            .unwrap_or_else(|_| Err(Error::Playback("control dropped".to_string())))
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        let plays: Vec<u64> = state.playing.iter().map(|(id, _)| *id).collect();
        for play in plays {
            state.release(play);
        }
    }
}

/// Scheduler over `sink` with the given bound, enabled
pub fn enabled_scheduler(sink: &ScriptedSink, max_queue_size: usize) -> PlaybackScheduler {
    PlaybackScheduler::new(
        Arc::new(sink.clone()),
        EventBus::new(256),
        SchedulerOptions {
            max_queue_size,
            start_enabled: true,
        },
    )
    .unwrap()
}

/// Locators of the pending queue in play order
pub fn pending_names(scheduler: &PlaybackScheduler) -> Vec<String> {
    scheduler
        .pending()
        .iter()
        .map(|item| item.media_ref.as_str().to_string())
        .collect()
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_backend(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
