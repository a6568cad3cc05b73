//! Fixed-capacity, newest-first event buffer.

use std::collections::VecDeque;

use beacon_core::{AlertEvent, EventId, NotificationEvent};

/// Anything that can be stored in a [`BoundedBuffer`].
pub trait Keyed {
    /// Identifier used for dismissal.
    fn key(&self) -> &EventId;
}

impl Keyed for NotificationEvent {
    fn key(&self) -> &EventId {
        &self.id
    }
}

impl Keyed for AlertEvent {
    fn key(&self) -> &EventId {
        &self.id
    }
}

/// Most-recent-first buffer that evicts its oldest entries past capacity.
///
/// Entries are never edited in place, only removed or evicted.
#[derive(Clone, Debug)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Keyed> BoundedBuffer<T> {
    /// Create an empty buffer holding at most `capacity` entries (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend `item`, then drop the oldest entries beyond capacity.
    ///
    /// Returns how many entries were evicted.
    pub fn push(&mut self, item: T) -> usize {
        self.items.push_front(item);
        let evicted = self.items.len().saturating_sub(self.capacity);
        self.items.truncate(self.capacity);
        evicted
    }

    /// Remove the entry with `id`.
    pub fn remove(&mut self, id: &EventId) -> Option<T> {
        let pos = self.items.iter().position(|item| item.key() == id)?;
        self.items.remove(pos)
    }

    /// Whether an entry with `id` is held.
    pub fn contains(&self, id: &EventId) -> bool {
        self.items.iter().any(|item| item.key() == id)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::NotificationDraft;
    use proptest::prelude::*;

    fn note(n: usize) -> NotificationEvent {
        NotificationDraft {
            title: format!("n{n}"),
            message: String::new(),
        }
        .into_event()
        .unwrap()
    }

    #[test]
    fn newest_first() {
        let mut buf = BoundedBuffer::new(5);
        let _ = buf.push(note(1));
        let _ = buf.push(note(2));
        let titles: Vec<_> = buf.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["n2", "n1"]);
        assert_eq!(buf.latest().unwrap().title, "n2");
    }

    #[test]
    fn fifty_one_keeps_fifty_most_recent() {
        let mut buf = BoundedBuffer::new(50);
        let mut evicted = 0;
        for n in 1..=51 {
            evicted += buf.push(note(n));
        }
        assert_eq!(evicted, 1);
        assert_eq!(buf.len(), 50);
        let titles: Vec<_> = buf.iter().map(|n| n.title.clone()).collect();
        let expected: Vec<_> = (2..=51).rev().map(|n| format!("n{n}")).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn remove_by_id() {
        let mut buf = BoundedBuffer::new(3);
        let first = note(1);
        let id = first.id.clone();
        let _ = buf.push(first);
        let _ = buf.push(note(2));

        assert!(buf.contains(&id));
        assert_eq!(buf.remove(&id).unwrap().title, "n1");
        assert!(!buf.contains(&id));
        assert!(buf.remove(&id).is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn clear_empties() {
        let mut buf = BoundedBuffer::new(3);
        let _ = buf.push(note(1));
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = BoundedBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        let _ = buf.push(note(1));
        let _ = buf.push(note(2));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest().unwrap().title, "n2");
    }

    proptest! {
        #[test]
        fn holds_most_recent_within_capacity(capacity in 1usize..20, count in 0usize..60) {
            let mut buf = BoundedBuffer::new(capacity);
            for n in 0..count {
                let _ = buf.push(note(n));
            }
            prop_assert_eq!(buf.len(), count.min(capacity));
            let titles: Vec<_> = buf.iter().map(|n| n.title.clone()).collect();
            let expected: Vec<_> = (0..count).rev().take(capacity).map(|n| format!("n{n}")).collect();
            prop_assert_eq!(titles, expected);
        }
    }
}
