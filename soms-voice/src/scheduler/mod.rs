//! Audio playback scheduler
//!
//! Serializes clip requests from independent producers (task announcements,
//! polled voice events, user actions) onto a single output device.
//!
//! - Pending clips are ordered by priority, FIFO within a level, and bounded;
//!   overflow evicts from the tail.
//! - At most one clip plays at a time. When it ends or fails the next one
//!   starts immediately; a failing clip is never retried.
//! - Disabling stops the in-flight clip and discards the backlog. Requests
//!   made while disabled are dropped silently.
//!
//! All mutations are short critical sections over one mutex. Listener
//! notification and event publication happen after the lock is released.

mod queue;

pub use queue::{PendingQueue, QueueItem};

use crate::error::{Error, Result};
use crate::observable::{Listener, ListenerSet, Observable, Subscription};
use crate::playback::AudioSink;
use serde::Serialize;
use soms_common::events::{AudioEvent, EventBus};
use soms_common::{AudioPriority, MediaRef};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default bound on the pending queue
pub const MAX_QUEUE_SIZE: usize = 20;

/// Scheduler construction options
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Pending queue bound (the in-flight clip is not counted)
    pub max_queue_size: usize,
    /// Initial value of the enabled flag
    pub start_enabled: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_queue_size: MAX_QUEUE_SIZE,
            start_enabled: false,
        }
    }
}

/// Result of an `enqueue` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Clip is pending (or already started playing)
    Queued(Uuid),
    /// Clip was inserted but landed past the bound and was evicted
    Overflowed(Uuid),
    /// Scheduler is disabled; request dropped
    Disabled,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued(_))
    }

    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            EnqueueOutcome::Queued(id) | EnqueueOutcome::Overflowed(id) => Some(*id),
            EnqueueOutcome::Disabled => None,
        }
    }
}

/// Serializable snapshot of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub playing: bool,
    pub current: Option<QueueItem>,
    pub pending: Vec<QueueItem>,
    pub max_queue_size: usize,
}

/// The clip occupying the output device
struct InFlight {
    item: QueueItem,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct SchedulerState {
    enabled: bool,
    queue: PendingQueue,
    current: Option<InFlight>,
    /// Incremented per playback; completions from older playbacks are ignored
    generation: u64,
    drain_scheduled: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    sink: Arc<dyn AudioSink>,
    listeners: ListenerSet,
    events: EventBus,
    runtime: Handle,
    max_queue_size: usize,
}

/// Priority-ordered, single-consumer playback queue
///
/// Cheap to clone; all clones share one queue and one output slot. Construct
/// one per process in the composition root and hand clones to producers.
#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<SchedulerInner>,
}

impl PlaybackScheduler {
    /// Create a scheduler bound to the current Tokio runtime.
    ///
    /// Fails when called outside a runtime.
    pub fn new(
        sink: Arc<dyn AudioSink>,
        events: EventBus,
        options: SchedulerOptions,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Playback(format!("Scheduler requires a Tokio runtime: {}", e)))?;

        info!(
            "Playback scheduler using '{}' sink, max queue size {}",
            sink.name(),
            options.max_queue_size
        );

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    enabled: options.start_enabled,
                    queue: PendingQueue::new(),
                    current: None,
                    generation: 0,
                    drain_scheduled: false,
                }),
                sink,
                listeners: ListenerSet::new(),
                events,
                runtime,
                max_queue_size: options.max_queue_size,
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.inner.listeners.notify();
    }

    fn emit(&self, event: AudioEvent) {
        self.inner.events.emit_lossy(event);
    }

    // ========================================
    // Mutations
    // ========================================

    /// Enable or disable playback.
    ///
    /// Disabling stops the in-flight clip, discards every pending clip and
    /// notifies subscribers. Enabling only flips the flag and notifies.
    pub fn set_enabled(&self, value: bool) {
        let (was_enabled, stopped, dropped) = {
            let mut state = self.lock_state();
            let was_enabled = state.enabled;
            state.enabled = value;

            if value {
                (was_enabled, None, 0)
            } else {
                let stopped = state.current.take().map(|in_flight| {
                    if let Some(task) = &in_flight.task {
                        task.abort();
                    }
                    in_flight.item
                });
                let dropped = state.queue.clear();
                (was_enabled, stopped, dropped)
            }
        };

        if stopped.is_some() {
            // The aborted task only drops its play future when next polled
            self.inner.sink.stop();
        }

        if was_enabled != value {
            info!("Audio playback {}", if value { "enabled" } else { "disabled" });
        }

        self.emit(AudioEvent::EnabledChanged {
            enabled: value,
            timestamp: chrono::Utc::now(),
        });

        if let Some(item) = stopped {
            info!("Stopped in-flight clip {}", item.media_ref);
            self.emit(AudioEvent::PlaybackStopped {
                item_id: item.id,
                media_ref: item.media_ref,
                timestamp: chrono::Utc::now(),
            });
        }

        if dropped > 0 {
            debug!("Discarded {} pending clips on disable", dropped);
            self.emit(AudioEvent::QueueCleared {
                dropped,
                timestamp: chrono::Utc::now(),
            });
        }

        self.notify();
    }

    /// Queue a clip at the given priority.
    ///
    /// Dropped silently while disabled. On overflow the tail of the queue
    /// (lowest priority, latest arrival) is evicted, which may be the new
    /// clip itself.
    pub fn enqueue(&self, media_ref: impl Into<MediaRef>, priority: AudioPriority) -> EnqueueOutcome {
        let item = QueueItem::new(media_ref, priority);
        let item_id = item.id;

        let (evicted, queue_len, started) = {
            let mut state = self.lock_state();
            if !state.enabled {
                debug!("Audio disabled, dropping {} ({})", item.media_ref, priority);
                return EnqueueOutcome::Disabled;
            }

            state.queue.insert(item.clone());
            // An idle device takes the head now rather than evicting while
            // the deferred drain is pending
            let started = if state.queue.len() > self.inner.max_queue_size {
                self.start_next(&mut state)
            } else {
                None
            };
            let evicted = state.queue.trim_to(self.inner.max_queue_size);
            (evicted, state.queue.len(), started)
        };

        let self_evicted = evicted.iter().any(|e| e.id == item_id);

        if !self_evicted {
            debug!(
                "Queued {} at {} ({} pending)",
                item.media_ref, priority, queue_len
            );
            self.emit(AudioEvent::ItemQueued {
                item_id,
                media_ref: item.media_ref.clone(),
                priority,
                queue_len,
                timestamp: chrono::Utc::now(),
            });
        }

        for dropped in evicted {
            warn!(
                "Audio queue full ({}), evicting {} ({})",
                self.inner.max_queue_size, dropped.media_ref, dropped.priority
            );
            self.emit(AudioEvent::ItemEvicted {
                item_id: dropped.id,
                media_ref: dropped.media_ref,
                priority: dropped.priority,
                timestamp: chrono::Utc::now(),
            });
        }

        if let Some(started) = started {
            self.announce_started(started);
        }

        self.notify();
        self.schedule_drain();

        if self_evicted {
            EnqueueOutcome::Overflowed(item_id)
        } else {
            EnqueueOutcome::Queued(item_id)
        }
    }

    /// Queue a clip once an async producer resolves.
    ///
    /// The producer is typically a network call (speech synthesis, a random
    /// clip endpoint). It is not started when the scheduler is disabled, in
    /// which case `None` is returned. Otherwise it runs on its own task and
    /// the clip is inserted when it resolves, so its position reflects
    /// resolution time rather than call time. Failures and empty results
    /// are logged and published, never returned.
    pub fn enqueue_from_async_producer<F, E>(
        &self,
        producer: F,
        priority: AudioPriority,
    ) -> Option<JoinHandle<()>>
    where
        F: Future<Output = std::result::Result<Option<MediaRef>, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if !self.is_enabled() {
            debug!("Audio disabled, not starting {} producer", priority);
            return None;
        }

        let scheduler = self.clone();
        Some(self.inner.runtime.spawn(async move {
            match producer.await {
                Ok(Some(media_ref)) => {
                    scheduler.enqueue(media_ref, priority);
                }
                Ok(None) => {
                    debug!("{} producer returned no media", priority);
                    scheduler.emit(AudioEvent::ProducerFailed {
                        priority,
                        error: "producer returned no media".to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => {
                    warn!("{} producer failed: {}", priority, e);
                    scheduler.emit(AudioEvent::ProducerFailed {
                        priority,
                        error: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }))
    }

    /// Empty the pending queue without touching the in-flight clip.
    ///
    /// Returns the number of clips discarded.
    pub fn clear(&self) -> usize {
        let dropped = self.lock_state().queue.clear();

        debug!("Cleared {} pending clips", dropped);
        self.emit(AudioEvent::QueueCleared {
            dropped,
            timestamp: chrono::Utc::now(),
        });
        self.notify();
        dropped
    }

    // ========================================
    // Drain loop
    // ========================================

    /// Arrange for the drain step to run on the next runtime turn.
    ///
    /// Enqueues made in the same turn are therefore dequeued by priority,
    /// not by call order. Coalesces repeated requests.
    fn schedule_drain(&self) {
        {
            let mut state = self.lock_state();
            if state.drain_scheduled
                || state.current.is_some()
                || !state.enabled
                || state.queue.is_empty()
            {
                return;
            }
            state.drain_scheduled = true;
        }

        let scheduler = self.clone();
        self.inner.runtime.spawn(async move {
            scheduler.drain();
        });
    }

    /// Start the head clip if the device is idle.
    fn drain(&self) {
        let started = {
            let mut state = self.lock_state();
            state.drain_scheduled = false;
            self.start_next(&mut state)
        };

        if let Some(item) = started {
            self.announce_started(item);
            self.notify();
        }
    }

    /// Pop the head clip and spawn its playback if the device is idle.
    ///
    /// Runs under the state lock; the caller publishes the start.
    fn start_next(&self, state: &mut SchedulerState) -> Option<QueueItem> {
        if state.current.is_some() || !state.enabled {
            return None;
        }
        let item = state.queue.pop_front()?;

        state.generation += 1;
        let generation = state.generation;

        let scheduler = self.clone();
        let sink = Arc::clone(&self.inner.sink);
        let media_ref = item.media_ref.clone();
        // The task's completion report takes this same lock, so the
        // handle is stored before the task can observe the slot.
        let task = self.inner.runtime.spawn(async move {
            let outcome = sink.play(&media_ref).await;
            scheduler.finish_playback(generation, outcome);
        });

        state.current = Some(InFlight {
            item: item.clone(),
            generation,
            task: Some(task),
        });
        Some(item)
    }

    fn announce_started(&self, item: QueueItem) {
        info!("Playing {} ({})", item.media_ref, item.priority);
        self.emit(AudioEvent::PlaybackStarted {
            item_id: item.id,
            media_ref: item.media_ref,
            priority: item.priority,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Completion or failure of playback `generation`; advances the queue.
    fn finish_playback(&self, generation: u64, outcome: Result<()>) {
        let finished = {
            let mut state = self.lock_state();
            let is_current = state
                .current
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == generation);
            if is_current {
                state.current.take().map(|in_flight| in_flight.item)
            } else {
                None
            }
        };

        let Some(item) = finished else {
            debug!("Ignoring completion of cancelled playback {}", generation);
            return;
        };

        match outcome {
            Ok(()) => {
                debug!("Finished {}", item.media_ref);
                self.emit(AudioEvent::PlaybackFinished {
                    item_id: item.id,
                    media_ref: item.media_ref,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                warn!("Playback of {} failed: {}", item.media_ref, e);
                self.emit(AudioEvent::PlaybackFailed {
                    item_id: item.id,
                    media_ref: item.media_ref,
                    error: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        self.notify();
        self.drain();
    }

    // ========================================
    // Reads
    // ========================================

    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    pub fn is_playing(&self) -> bool {
        self.lock_state().current.is_some()
    }

    /// Clip currently occupying the device
    pub fn current_item(&self) -> Option<QueueItem> {
        self.lock_state()
            .current
            .as_ref()
            .map(|in_flight| in_flight.item.clone())
    }

    /// Snapshot of the pending queue in play order
    pub fn pending(&self) -> Vec<QueueItem> {
        self.lock_state().queue.to_vec()
    }

    pub fn pending_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn max_queue_size(&self) -> usize {
        self.inner.max_queue_size
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.lock_state();
        SchedulerStatus {
            enabled: state.enabled,
            playing: state.current.is_some(),
            current: state.current.as_ref().map(|in_flight| in_flight.item.clone()),
            pending: state.queue.to_vec(),
            max_queue_size: self.inner.max_queue_size,
        }
    }

    /// Event bus carrying this scheduler's events
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // ========================================
    // Observation
    // ========================================

    /// Register a listener invoked after every state change
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.listeners.add(listener)
    }

    /// Observable view of the enabled flag
    pub fn enabled_binding(&self) -> EnabledBinding {
        EnabledBinding {
            scheduler: self.clone(),
        }
    }
}

/// `Observable<bool>` over the scheduler's enabled flag
#[derive(Clone)]
pub struct EnabledBinding {
    scheduler: PlaybackScheduler,
}

impl Observable<bool> for EnabledBinding {
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.scheduler.subscribe(listener)
    }

    fn get(&self) -> bool {
        self.scheduler.is_enabled()
    }
}
