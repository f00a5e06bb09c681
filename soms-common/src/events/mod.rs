//! Event types for the SOMS audio event system
//!
//! Provides shared event definitions and the EventBus used to fan scheduler
//! activity out to SSE clients and in-process observers.

mod audio_types;

pub use audio_types::{AudioPriority, MediaRef};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Audio scheduler events
///
/// Broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AudioEvent {
    /// Playback was enabled or disabled
    EnabledChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A clip was inserted into the pending queue
    ItemQueued {
        item_id: Uuid,
        media_ref: MediaRef,
        priority: AudioPriority,
        /// Pending queue length after insertion and trimming
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A pending clip was dropped because the queue overflowed
    ItemEvicted {
        item_id: Uuid,
        media_ref: MediaRef,
        priority: AudioPriority,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending queue emptied by `clear` or by disabling
    QueueCleared {
        /// Number of pending clips discarded
        dropped: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A clip was dequeued and handed to the output device
    PlaybackStarted {
        item_id: Uuid,
        media_ref: MediaRef,
        priority: AudioPriority,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A clip played to its end
    PlaybackFinished {
        item_id: Uuid,
        media_ref: MediaRef,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A clip failed to load, decode or play; the queue moved on
    PlaybackFailed {
        item_id: Uuid,
        media_ref: MediaRef,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The in-flight clip was cut off because playback was disabled
    PlaybackStopped {
        item_id: Uuid,
        media_ref: MediaRef,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An async producer failed or produced nothing to play
    ProducerFailed {
        priority: AudioPriority,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AudioEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AudioEvent::EnabledChanged { .. } => "EnabledChanged",
            AudioEvent::ItemQueued { .. } => "ItemQueued",
            AudioEvent::ItemEvicted { .. } => "ItemEvicted",
            AudioEvent::QueueCleared { .. } => "QueueCleared",
            AudioEvent::PlaybackStarted { .. } => "PlaybackStarted",
            AudioEvent::PlaybackFinished { .. } => "PlaybackFinished",
            AudioEvent::PlaybackFailed { .. } => "PlaybackFailed",
            AudioEvent::PlaybackStopped { .. } => "PlaybackStopped",
            AudioEvent::ProducerFailed { .. } => "ProducerFailed",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use soms_common::events::{AudioEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(AudioEvent::EnabledChanged {
///     enabled: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(AudioEvent::EnabledChanged { enabled: true, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AudioEvent,
    ) -> Result<usize, broadcast::error::SendError<AudioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AudioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
