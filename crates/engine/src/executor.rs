// SPDX-License-Identifier: Apache-2.0

//! Task executor with an optional worker-thread pool.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    accepting: AtomicBool,
}

impl Inner {
    fn pop_for(&self, slice: Duration) -> Option<Task> {
        let deadline = Instant::now() + slice;
        let mut queue = self.queue.lock();
        loop {
            if let Some(task) = queue.pop_front() {
                return Some(task);
            }
            if !self.accepting.load(Ordering::Acquire) {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if self.not_empty.wait_for(&mut queue, deadline - now).timed_out() {
                return queue.pop_front();
            }
        }
    }
}

/// Cooperative task executor.
///
/// With `worker_threads == 0` nothing runs until the owner drives the
/// executor through [`Executor::spin_once`]; this is the mode both services
/// use so every task shares the main loop's thread. With workers, tasks run
/// on the pool as they arrive.
///
/// Handles are cheap to clone and all refer to the same queue.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Executor {
    /// Creates an executor with the given number of worker threads.
    #[must_use]
    pub fn new(worker_threads: usize) -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            accepting: AtomicBool::new(true),
        });

        let mut workers = Vec::with_capacity(worker_threads);
        for i in 0..worker_threads {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("executor-{i}"))
                .spawn(move || {
                    while inner.accepting.load(Ordering::Acquire) {
                        if let Some(task) = inner.pop_for(Duration::from_millis(100)) {
                            task();
                        }
                    }
                });
            match handle {
                Ok(h) => workers.push(h),
                Err(_) => break,
            }
        }

        Executor {
            inner,
            workers: Arc::new(Mutex::new(workers)),
        }
    }

    /// Submits a task. Returns false when the executor has stopped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if !self.inner.accepting.load(Ordering::Acquire) {
            return false;
        }
        {
            let mut queue = self.inner.queue.lock();
            // Re-check under the lock so stop() cannot race a late post past
            // the queue drain.
            if !self.inner.accepting.load(Ordering::Acquire) {
                return false;
            }
            queue.push_back(Box::new(task));
        }
        self.inner.not_empty.notify_one();
        true
    }

    /// Runs at most one pending task, waiting up to `slice` for one to
    /// arrive. Returns true when a task ran.
    pub fn spin_once(&self, slice: Duration) -> bool {
        match self.inner.pop_for(slice) {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Stops the executor: new posts are refused, waiters wake, worker
    /// threads finish their current task and exit, and tasks still queued
    /// are dropped unrun.
    pub fn stop(&self) {
        self.inner.accepting.store(false, Ordering::Release);
        self.inner.queue.lock().clear();
        self.inner.not_empty.notify_all();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
    }

    /// True until [`Executor::stop`] is called.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_spin_once_runs_posted_task() {
        let exec = Executor::new(0);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(exec.post(move || flag.store(true, Ordering::SeqCst)));
        assert!(exec.spin_once(Duration::from_millis(5)));
        assert!(ran.load(Ordering::SeqCst));
        // Nothing left to run.
        assert!(!exec.spin_once(Duration::from_millis(1)));
    }

    #[test]
    fn test_workers_drain_tasks() {
        let exec = Executor::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let count = Arc::clone(&count);
            assert!(exec.post(move || {
                let _ = count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 16 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(count.load(Ordering::SeqCst), 16);
        exec.stop();
    }

    #[test]
    fn test_stop_refuses_new_posts() {
        let exec = Executor::new(0);
        exec.stop();
        assert!(!exec.post(|| {}));
        assert!(!exec.spin_once(Duration::from_millis(1)));
    }
}
