//! Bounded history handed to late subscribers of a hot flow.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent values.
///
/// `len() <= capacity()` always holds; a push into a full buffer evicts the
/// oldest entry. A capacity of zero keeps nothing.
#[derive(Clone, Debug)]
pub struct ReplayBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> ReplayBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a value, returning the evicted one if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(value);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> ReplayBuffer<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_most_recent_values_in_order() {
        let mut buffer = ReplayBuffer::new(5);
        let evicted: Vec<Option<i32>> = (1..=7).map(|v| buffer.push(v)).collect();

        assert_eq!(buffer.snapshot(), vec![3, 4, 5, 6, 7]);
        assert_eq!(buffer.len(), buffer.capacity());
        assert_eq!(&evicted[5..], &[Some(1), Some(2)]);
        assert!(evicted[..5].iter().all(Option::is_none));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut buffer = ReplayBuffer::new(0);
        assert_eq!(buffer.push("a"), Some("a"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_empties_the_history() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.push(1);
        buffer.push(2);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);
    }
}
