// SPDX-License-Identifier: Apache-2.0

//! Unbounded hand-off queue drained opportunistically by a spin loop.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Unbounded MPSC queue for results produced on worker lanes and consumed by
/// the owning main loop each spin. No waiting: the consumer polls with
/// [`DrainQueue::try_pop`] between other work.
#[derive(Default)]
pub struct DrainQueue<T> {
    buffer: Mutex<VecDeque<T>>,
}

impl<T> DrainQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        DrainQueue {
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues an item. Never fails; the producer side has nowhere to report
    /// backpressure and the consumer drains every spin.
    pub fn push(&self, item: T) {
        self.buffer.lock().push_back(item);
    }

    /// Dequeues without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.buffer.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_drain() {
        let q = DrainQueue::new();
        q.push("a");
        q.push("b");
        assert_eq!(q.try_pop(), Some("a"));
        assert_eq!(q.try_pop(), Some("b"));
        assert_eq!(q.try_pop(), None);
    }
}
