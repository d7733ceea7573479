// SPDX-License-Identifier: Apache-2.0

//! Multiple-producer, single-consumer bounded queue with a timed pop.

use crate::error::SendError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct State<T> {
    buffer: VecDeque<T>,
    is_closed: bool,
}

/// A bounded MPSC queue shared between transport listener threads (producers)
/// and a service main loop (consumer).
///
/// `push` never blocks: when the queue is at capacity the item is handed back
/// so the caller can synthesize a backpressure response. The consumer side
/// waits with a bounded timeout and a running predicate so shutdown is never
/// stuck behind an empty queue.
pub struct CmdQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> CmdQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        CmdQueue {
            state: Mutex::new(State {
                buffer: VecDeque::with_capacity(capacity),
                is_closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Enqueues an item, failing immediately when full or closed.
    pub fn push(&self, item: T) -> Result<(), SendError<T>> {
        let mut state = self.state.lock();
        if state.is_closed {
            return Err(SendError::Closed(item));
        }
        if state.buffer.len() >= self.capacity {
            return Err(SendError::Full(item));
        }
        state.buffer.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeues without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().buffer.pop_front()
    }

    /// Dequeues, waiting up to `timeout` for an item.
    ///
    /// Returns early with `None` when `running()` turns false (shutdown) or
    /// the timeout elapses with the queue still empty. The wait is released
    /// by `push` and by [`CmdQueue::notify_all`].
    pub fn pop_for(&self, timeout: Duration, running: impl Fn() -> bool) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.buffer.pop_front() {
                return Some(item);
            }
            if !running() || state.is_closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if self
                .not_empty
                .wait_for(&mut state, deadline - now)
                .timed_out()
            {
                return state.buffer.pop_front();
            }
        }
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// True when no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the queue closed and wakes every waiter. Queued items remain
    /// poppable; further pushes fail with [`SendError::Closed`].
    pub fn close(&self) {
        self.state.lock().is_closed = true;
        self.not_empty.notify_all();
    }

    /// Wakes every waiter without changing queue state. Used when an external
    /// running flag flips.
    pub fn notify_all(&self) {
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_push_pop_in_order() {
        let q = CmdQueue::new(4);
        q.push(1).expect("push");
        q.push(2).expect("push");
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn test_push_full() {
        let q = CmdQueue::new(2);
        q.push("a").expect("push");
        q.push("b").expect("push");
        match q.push("c") {
            Err(SendError::Full("c")) => {}
            other => panic!("expected Full, got {other:?}"),
        }
        // Popping makes room again.
        assert_eq!(q.try_pop(), Some("a"));
        q.push("c").expect("push after pop");
    }

    #[test]
    fn test_pop_for_times_out() {
        let q: CmdQueue<u32> = CmdQueue::new(1);
        let start = Instant::now();
        assert_eq!(q.pop_for(Duration::from_millis(20), || true), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_pop_for_released_by_push() {
        let q = Arc::new(CmdQueue::new(1));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                q.push(7u32).expect("push");
            })
        };
        assert_eq!(q.pop_for(Duration::from_secs(5), || true), Some(7));
        producer.join().expect("join");
    }

    #[test]
    fn test_pop_for_released_by_shutdown() {
        let q: Arc<CmdQueue<u32>> = Arc::new(CmdQueue::new(1));
        let running = Arc::new(AtomicBool::new(true));
        let stopper = {
            let q = Arc::clone(&q);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                running.store(false, Ordering::SeqCst);
                q.notify_all();
            })
        };
        let running_probe = Arc::clone(&running);
        let got = q.pop_for(Duration::from_secs(5), move || {
            running_probe.load(Ordering::SeqCst)
        });
        assert_eq!(got, None);
        stopper.join().expect("join");
    }

    #[test]
    fn test_closed_queue_rejects_push_but_drains() {
        let q = CmdQueue::new(2);
        q.push(1).expect("push");
        q.close();
        match q.push(2) {
            Err(SendError::Closed(2)) => {}
            other => panic!("expected Closed, got {other:?}"),
        }
        assert_eq!(q.try_pop(), Some(1));
    }
}
