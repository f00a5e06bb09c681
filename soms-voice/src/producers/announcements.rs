//! New-task announcements
//!
//! Polls the backend task list and announces tasks that appeared since the
//! previous poll. The first non-empty list only seeds the known set, so a
//! restart does not replay every open task.

use super::endpoint;
use crate::error::Result;
use crate::scheduler::PlaybackScheduler;
use serde::Deserialize;
use soms_common::{AudioPriority, MediaRef};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The task fields the announcer needs
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSummary {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub announcement_audio_url: Option<String>,
    /// Played by clients when the task is marked done
    #[serde(default)]
    pub completion_audio_url: Option<String>,
}

/// Detects newly created tasks between successive task lists
#[derive(Debug, Default)]
pub struct AnnouncementTracker {
    known: HashSet<i64>,
    seeded: bool,
}

impl AnnouncementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tasks` as the latest list and return the announcement clips
    /// of tasks that are new and still open.
    ///
    /// An empty list is ignored entirely and does not reset the known set.
    pub fn observe(&mut self, tasks: &[TaskSummary]) -> Vec<MediaRef> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let current: HashSet<i64> = tasks.iter().map(|t| t.id).collect();

        if !self.seeded {
            self.seeded = true;
            self.known = current;
            debug!("Seeded announcement tracker with {} tasks", self.known.len());
            return Vec::new();
        }

        let clips = tasks
            .iter()
            .filter(|t| !self.known.contains(&t.id) && !t.is_completed)
            .filter_map(|t| {
                let url = t.announcement_audio_url.as_deref().filter(|u| !u.is_empty())?;
                info!("New task '{}' ({}), announcing", t.title, t.id);
                Some(MediaRef::new(url))
            })
            .collect();

        self.known = current;
        clips
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

/// Background poller feeding task announcements into the scheduler
pub struct AnnouncementWatcher {
    http: reqwest::Client,
    base_url: String,
    scheduler: PlaybackScheduler,
    poll_interval: Duration,
    tracker: AnnouncementTracker,
}

impl AnnouncementWatcher {
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
            tracker: AnnouncementTracker::new(),
        }
    }

    async fn fetch_tasks(&self) -> Result<Vec<TaskSummary>> {
        let url = endpoint(&self.base_url, "/api/tasks/");
        let tasks = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tasks)
    }

    /// Run one poll. Returns the number of announcements queued.
    ///
    /// Does nothing while audio is disabled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        if !self.scheduler.is_enabled() {
            return Ok(0);
        }

        let tasks = self.fetch_tasks().await?;
        let clips = self.tracker.observe(&tasks);

        let mut queued = 0;
        for clip in clips {
            let media_ref = clip.resolve_against(&self.base_url);
            if self
                .scheduler
                .enqueue(media_ref, AudioPriority::Announcement)
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
            "Starting task announcement watcher (interval: {}ms)",
            self.poll_interval.as_millis()
        );

        let mut timer = interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if let Err(e) = self.poll_once().await {
                warn!("Failed to fetch tasks: {}", e);
            }
        }
    }
}
