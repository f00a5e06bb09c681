//! Pending queue of audio clips
//!
//! Kept sorted by `(priority, arrival order)` after every mutation.

use serde::Serialize;
use soms_common::{AudioPriority, MediaRef};
use std::collections::VecDeque;
use uuid::Uuid;

/// A clip waiting to be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    /// Identifier used in events and status responses
    pub id: Uuid,
    pub media_ref: MediaRef,
    pub priority: AudioPriority,
}

impl QueueItem {
    pub fn new(media_ref: impl Into<MediaRef>, priority: AudioPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_ref: media_ref.into(),
            priority,
        }
    }
}

/// Priority-ordered backlog, FIFO within a priority level
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<QueueItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every item of equal or higher precedence.
    ///
    /// Returns the index the item landed at.
    pub fn insert(&mut self, item: QueueItem) -> usize {
        let position = self
            .items
            .partition_point(|existing| existing.priority <= item.priority);
        self.items.insert(position, item);
        position
    }

    /// Drop items from the tail until at most `capacity` remain.
    ///
    /// Evicted items are returned in the order they were removed.
    pub fn trim_to(&mut self, capacity: usize) -> Vec<QueueItem> {
        let mut evicted = Vec::new();
        while self.items.len() > capacity {
            match self.items.pop_back() {
                Some(item) => evicted.push(item),
                None => break,
            }
        }
        evicted
    }

    /// Remove the highest-priority, earliest-arrived item
    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// Empty the queue, returning how many items were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AudioPriority::*;

    fn item(name: &str, priority: AudioPriority) -> QueueItem {
        QueueItem::new(name, priority)
    }

    fn names(queue: &PendingQueue) -> Vec<&str> {
        queue.iter().map(|i| i.media_ref.as_str()).collect()
    }

    #[test]
    fn test_insert_orders_by_priority() {
        let mut queue = PendingQueue::new();
        queue.insert(item("a", VoiceEvent));
        queue.insert(item("b", UserAction));
        queue.insert(item("c", Announcement));

        assert_eq!(names(&queue), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_insert_is_fifo_within_priority() {
        let mut queue = PendingQueue::new();
        assert_eq!(queue.insert(item("v1", VoiceEvent)), 0);
        assert_eq!(queue.insert(item("u1", UserAction)), 0);
        assert_eq!(queue.insert(item("v2", VoiceEvent)), 2);
        assert_eq!(queue.insert(item("u2", UserAction)), 1);
        assert_eq!(queue.insert(item("a1", Announcement)), 2);

        assert_eq!(names(&queue), vec!["u1", "u2", "a1", "v1", "v2"]);
    }

    #[test]
    fn test_trim_drops_from_tail() {
        let mut queue = PendingQueue::new();
        queue.insert(item("x", VoiceEvent));
        queue.insert(item("y", VoiceEvent));
        queue.insert(item("z", UserAction));

        let evicted = queue.trim_to(2);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].media_ref.as_str(), "y");
        assert_eq!(names(&queue), vec!["z", "x"]);
    }

    #[test]
    fn test_trim_can_evict_the_new_item() {
        let mut queue = PendingQueue::new();
        queue.insert(item("u1", UserAction));
        queue.insert(item("u2", UserAction));
        queue.insert(item("late", VoiceEvent));

        let evicted = queue.trim_to(2);
        assert_eq!(evicted[0].media_ref.as_str(), "late");
        assert_eq!(names(&queue), vec!["u1", "u2"]);
    }

    #[test]
    fn test_trim_noop_under_capacity() {
        let mut queue = PendingQueue::new();
        queue.insert(item("a", Announcement));
        assert!(queue.trim_to(20).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_and_clear() {
        let mut queue = PendingQueue::new();
        queue.insert(item("a", VoiceEvent));
        queue.insert(item("b", UserAction));

        assert_eq!(queue.pop_front().unwrap().media_ref.as_str(), "b");
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
        assert!(queue.pop_front().is_none());
    }
}
