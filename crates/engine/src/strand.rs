// SPDX-License-Identifier: Apache-2.0

//! Serialized execution lanes over a shared executor.

use crate::executor::{Executor, Task};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct StrandState {
    queue: VecDeque<Task>,
    // True while a drainer for this strand is queued or running on the
    // executor. At most one drainer exists at a time, which is what makes
    // the lane serial.
    active: bool,
}

/// A serial execution lane bound to an [`Executor`].
///
/// Tasks posted through one strand run in posting order and never overlap,
/// regardless of how many worker threads the executor has. Tasks from
/// different strands interleave freely.
#[derive(Clone)]
pub struct Strand {
    exec: Executor,
    state: Arc<Mutex<StrandState>>,
}

impl Strand {
    /// Creates a strand over `exec`.
    #[must_use]
    pub fn new(exec: &Executor) -> Self {
        Strand {
            exec: exec.clone(),
            state: Arc::new(Mutex::new(StrandState {
                queue: VecDeque::new(),
                active: false,
            })),
        }
    }

    /// Submits a task onto the lane. Returns false when the underlying
    /// executor refuses work (stopped).
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if !self.exec.is_accepting() {
            return false;
        }
        let needs_schedule = {
            let mut state = self.state.lock();
            state.queue.push_back(Box::new(task));
            if state.active {
                false
            } else {
                state.active = true;
                true
            }
        };
        if needs_schedule && !self.schedule_drainer() {
            // The executor stopped between the check and the post; undo the
            // claim so a later post can retry.
            let mut state = self.state.lock();
            state.active = false;
            state.queue.clear();
            return false;
        }
        true
    }

    fn schedule_drainer(&self) -> bool {
        let this = self.clone();
        self.exec.post(move || this.run_one())
    }

    // Runs exactly one queued task, then re-arms for the next. One task per
    // executor submission keeps lanes fair with each other.
    fn run_one(&self) {
        let task = self.state.lock().queue.pop_front();
        if let Some(task) = task {
            task();
        }
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            state.active = false;
        } else {
            drop(state);
            if !self.schedule_drainer() {
                let mut state = self.state.lock();
                state.active = false;
                state.queue.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_strand_preserves_order_externally_driven() {
        let exec = Executor::new(0);
        let strand = Strand::new(&exec);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            assert!(strand.post(move || seen.lock().push(i)));
        }
        while exec.spin_once(Duration::from_millis(1)) {}
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_strand_tasks_never_overlap() {
        let exec = Executor::new(4);
        let strand = Strand::new(&exec);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..64 {
            let in_flight = Arc::clone(&in_flight);
            let overlapped = Arc::clone(&overlapped);
            let done = Arc::clone(&done);
            assert!(strand.post(move || {
                if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_micros(200));
                let _ = in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while done.load(Ordering::SeqCst) < 64 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(done.load(Ordering::SeqCst), 64);
        assert!(!overlapped.load(Ordering::SeqCst));
        exec.stop();
    }

    #[test]
    fn test_two_strands_share_one_executor() {
        let exec = Executor::new(0);
        let a = Strand::new(&exec);
        let b = Strand::new(&exec);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let sa = Arc::clone(&seen);
            let sb = Arc::clone(&seen);
            assert!(a.post(move || sa.lock().push(("a", i))));
            assert!(b.post(move || sb.lock().push(("b", i))));
        }
        while exec.spin_once(Duration::from_millis(1)) {}
        let seen = seen.lock();
        let a_order: Vec<_> = seen.iter().filter(|(s, _)| *s == "a").collect();
        let b_order: Vec<_> = seen.iter().filter(|(s, _)| *s == "b").collect();
        assert_eq!(a_order.len(), 3);
        assert_eq!(b_order.len(), 3);
        assert!(a_order.windows(2).all(|w| w[0].1 < w[1].1));
        assert!(b_order.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn test_post_after_stop_is_refused() {
        let exec = Executor::new(0);
        let strand = Strand::new(&exec);
        exec.stop();
        assert!(!strand.post(|| {}));
    }
}
