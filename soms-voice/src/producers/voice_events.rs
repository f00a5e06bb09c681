//! Voice event polling
//!
//! Ephemeral spoken messages are published by the backend for a short window.
//! Each one is played at most once per process.

use super::endpoint;
use crate::error::Result;
use crate::scheduler::PlaybackScheduler;
use serde::Deserialize;
use soms_common::{AudioPriority, MediaRef};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A recent voice event as returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceEvent {
    pub id: i64,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Remembers which voice events were already queued
#[derive(Debug, Default)]
pub struct VoiceEventTracker {
    played: HashSet<i64>,
}

impl VoiceEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the events not seen before, in list order, marking them played.
    ///
    /// Events without an audio URL are skipped and stay unmarked. Ids that
    /// have left the recent window are forgotten; an empty list forgets
    /// nothing.
    pub fn take_unplayed<'a>(&mut self, events: &'a [VoiceEvent]) -> Vec<&'a VoiceEvent> {
        if !events.is_empty() {
            let recent: HashSet<i64> = events.iter().map(|event| event.id).collect();
            self.played.retain(|id| recent.contains(id));
        }

        events
            .iter()
            .filter(|event| !event.audio_url.is_empty())
            .filter(|event| self.played.insert(event.id))
            .collect()
    }

    pub fn played_count(&self) -> usize {
        self.played.len()
    }
}

/// Background poller feeding voice events into the scheduler
pub struct VoiceEventPoller {
    http: reqwest::Client,
    base_url: String,
    scheduler: PlaybackScheduler,
    poll_interval: Duration,
    tracker: VoiceEventTracker,
}

impl VoiceEventPoller {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        scheduler: PlaybackScheduler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            scheduler,
            poll_interval,
            tracker: VoiceEventTracker::new(),
        }
    }

    async fn fetch_recent(&self) -> Result<Vec<VoiceEvent>> {
        let url = endpoint(&self.base_url, "/api/voice-events/recent");
        let events = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(events)
    }

    /// Run one poll. Returns the number of events queued.
    ///
    /// Does nothing while audio is disabled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        if !self.scheduler.is_enabled() {
            return Ok(0);
        }

        let events = self.fetch_recent().await?;
        let mut queued = 0;
        for event in self.tracker.take_unplayed(&events) {
            debug!(
                "Voice event {}: {}",
                event.id,
                event.message.as_deref().unwrap_or("")
            );
            let media_ref = MediaRef::new(event.audio_url.clone()).resolve_against(&self.base_url);
            if self
                .scheduler
                .enqueue(media_ref, AudioPriority::VoiceEvent)
                .is_queued()
            {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Poll forever
    pub async fn run(mut self) {
        info!(
            "Starting voice event poller (interval: {}ms)",
            self.poll_interval.as_millis()
        );

        let mut timer = interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if let Err(e) = self.poll_once().await {
                warn!("Failed to fetch voice events: {}", e);
            }
        }
    }
}
