//! Queues chaining the pipeline stages together.
//!
//! `ConcurrentQueue` is the plain mutex-guarded FIFO polled by the main-thread
//! drains. `WorkQueue` layers a condition variable on top so a worker thread
//! can sleep until an item arrives or shutdown is requested.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// FIFO safe for concurrent push/pop. `is_empty` and `len` are snapshots that
/// may be stale as soon as they return.
#[derive(Debug)]
pub struct ConcurrentQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> ConcurrentQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn pop_front(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Removes every queued item, oldest first.
    pub fn take_all(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    // The deque is never left half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-consumer queue with wait-for-item semantics.
#[derive(Debug)]
pub struct WorkQueue<T> {
    queue: ConcurrentQueue<T>,
    available: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            queue: ConcurrentQueue::new(),
            available: Condvar::new(),
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `item` and wakes the consumer.
    pub fn push(&self, item: T) {
        self.queue.push(item);
        self.available.notify_one();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn take_all(&self) -> Vec<T> {
        self.queue.take_all()
    }

    /// Pops the next item, sleeping while the queue is empty. Returns `None`
    /// once the queue is empty and `shutdown` is set. Each sleep lasts at most
    /// `idle` so the flag is re-checked even without a wake-up.
    pub fn pop_or_wait(&self, shutdown: &AtomicBool, idle: Duration) -> Option<T> {
        let mut items = self.queue.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if shutdown.load(Ordering::Acquire) {
                return None;
            }
            items = match self.available.wait_timeout(items, idle) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Wakes every waiter. Taking the lock first orders the notification after
    /// any consumer that is between its shutdown check and its wait.
    pub fn wake_all(&self) {
        let _items = self.queue.lock();
        self.available.notify_all();
    }
}
