// SPDX-License-Identifier: Apache-2.0

//! Process-local counter registry.
//!
//! Counters are registered lazily by scoped name (`<scope>.<counter>`) and
//! incremented lock-free. The registry renders snapshots for periodic log
//! lines; exposition formats and push pipelines are a deployment concern and
//! live outside this repository.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter handle. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Adds one.
    pub fn inc(&self) {
        let _ = self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `n`.
    pub fn add(&self, n: u64) {
        let _ = self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Registry of named counters. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<RwLock<BTreeMap<String, Counter>>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Returns the counter registered under `name`, creating it on first
    /// use. Repeated calls with the same name share one counter.
    #[must_use]
    pub fn counter(&self, name: &str) -> Counter {
        if let Some(c) = self.counters.read().get(name) {
            return c.clone();
        }
        let mut counters = self.counters.write();
        counters.entry(name.to_owned()).or_default().clone()
    }

    /// Returns a scoped view that prefixes every counter name.
    #[must_use]
    pub fn scoped(&self, scope: &str) -> ScopedMetrics {
        ScopedMetrics {
            registry: self.clone(),
            scope: scope.to_owned(),
        }
    }

    /// Renders `name=value` pairs sorted by name, for log lines.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let counters = self.counters.read();
        let mut out = String::new();
        for (i, (name, counter)) in counters.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{name}={}", counter.get());
        }
        out
    }
}

/// Registry view with a fixed scope prefix.
#[derive(Clone)]
pub struct ScopedMetrics {
    registry: MetricsRegistry,
    scope: String,
}

impl ScopedMetrics {
    /// Returns the counter `<scope>.<name>`.
    #[must_use]
    pub fn counter(&self, name: &str) -> Counter {
        self.registry.counter(&format!("{}.{name}", self.scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_shared_by_name() {
        let registry = MetricsRegistry::new();
        registry.counter("cmd.total").inc();
        registry.counter("cmd.total").add(2);
        assert_eq!(registry.counter("cmd.total").get(), 3);
    }

    #[test]
    fn test_scoped_prefixes() {
        let registry = MetricsRegistry::new();
        let arm = registry.scoped("arm");
        arm.counter("queue_full").inc();
        assert_eq!(registry.counter("arm.queue_full").get(), 1);
    }

    #[test]
    fn test_snapshot_is_sorted_and_complete() {
        let registry = MetricsRegistry::new();
        registry.counter("b").inc();
        registry.counter("a").add(2);
        assert_eq!(registry.snapshot(), "a=2 b=1");
    }
}
