//! Bounded blocking FIFO queue (spec §4.2, §5): "a classical monitor —
//! `push` blocks while size = Q, `pop` blocks while size = 0, both wake
//! exactly one waiter per operation. The queue is the only synchronization
//! point" between the extractor's reader thread and its worker pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

pub struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            capacity,
            state: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Block until there is room, then enqueue `item`. Wakes exactly one
    /// waiting `pop`.
    pub fn push(&self, item: T) {
        let mut queue = self.state.lock().unwrap();
        while queue.len() >= self.capacity {
            queue = self.not_full.wait(queue).unwrap();
        }
        queue.push_back(item);
        self.not_empty.notify_one();
    }

    /// Block until an item is available, then dequeue it. Wakes exactly one
    /// waiting `push`.
    pub fn pop(&self) -> T {
        let mut queue = self.state.lock().unwrap();
        while queue.is_empty() {
            queue = self.not_empty.wait(queue).unwrap();
        }
        let item = queue.pop_front().unwrap();
        self.not_full.notify_one();
        item
    }
}
