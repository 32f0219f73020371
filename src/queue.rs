//! Bounded, drop-on-overflow FIFO used to connect adjacent pipeline stages.
//!
//! Mirrors the original `DataExchanger<T>`: a push past capacity discards
//! the whole queue first, on the theory that a consumer this far behind
//! only cares about the newest item anyway.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A move-only, single-consumer FIFO with a hard capacity and a
/// discard-everything overflow policy. Never fails: `push` always
/// succeeds, `get` always eventually returns (possibly the shutdown
/// sentinel).
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    capacity: usize,
}

struct State<T> {
    items: VecDeque<Option<T>>,
    overflow_count: u64,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            state: Mutex::new(State {
                items: VecDeque::new(),
                overflow_count: 0,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Enqueues `item`. If the queue exceeds capacity as a result, every
    /// previously-queued item is discarded — the screen has fallen far
    /// behind and the newest frame is the only one worth keeping.
    pub fn push(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        state.items.push_back(Some(item));
        if state.items.len() > self.capacity {
            let newest = state.items.pop_back().unwrap();
            state.items.clear();
            state.items.push_back(newest);
            state.overflow_count += 1;
        }
        self.not_empty.notify_one();
    }

    /// Blocks until an item is available, then returns it. Returns `None`
    /// only when the sentinel pushed by `stop` is popped.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Non-blocking pop. `None` means empty right now — not shutdown.
    pub fn poll(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        match state.items.pop_front() {
            Some(item) => item,
            None => None,
        }
    }

    /// Wakes a blocked `get` with the shutdown sentinel. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.items.push_back(None);
        self.not_empty.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times `push` has triggered the overflow-drain policy.
    /// Observability only, per spec's `OverflowDrain` (not-an-error) kind.
    pub fn overflow_count(&self) -> u64 {
        self.state.lock().unwrap().overflow_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order_preserved_below_capacity() {
        let q = BoundedQueue::new(20);
        for i in 0..10 {
            q.push(i);
        }
        for i in 0..10 {
            assert_eq!(q.get(), Some(i));
        }
    }

    #[test]
    fn overflow_drops_all_but_the_latest_push() {
        let q = BoundedQueue::new(5);
        for i in 0..6 {
            q.push(i);
        }
        assert_eq!(q.len(), 1);
        assert_eq!(q.get(), Some(5));
        assert_eq!(q.overflow_count(), 1);
    }

    #[test]
    fn poll_never_blocks() {
        let q: BoundedQueue<i32> = BoundedQueue::new(5);
        assert_eq!(q.poll(), None);
    }

    #[test]
    fn stop_wakes_blocked_get_with_sentinel() {
        let q = Arc::new(BoundedQueue::<i32>::new(5));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.get());
        thread::sleep(Duration::from_millis(50));
        q.stop();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn size_reflects_pending_items() {
        let q = BoundedQueue::new(20);
        q.push(1);
        q.push(2);
        assert_eq!(q.len(), 2);
        q.get();
        assert_eq!(q.len(), 1);
    }
}
