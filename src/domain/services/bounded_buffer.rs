//! Fixed-capacity FIFO with drop-oldest eviction

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> BoundedBuffer<T> {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedBuffer capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append at the back, returning the evicted front item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let dropped = if self.items.len() == self.capacity {
            self.evicted += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        dropped
    }

    /// Put an item back at the front without evicting anything newer.
    ///
    /// Used to requeue a message whose send failed. When the buffer is
    /// already full the item is discarded and returned.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        if self.items.len() == self.capacity {
            self.evicted += 1;
            return Some(item);
        }
        self.items.push_front(item);
        None
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items dropped to make room since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Newest first
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }
}
