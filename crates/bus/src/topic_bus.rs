// SPDX-License-Identifier: Apache-2.0

//! Topic registry, publishers and subscriptions.

use crate::error::Error;
use crate::qos::QosProfile;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

enum Mailbox {
    Reliable(mpsc::Sender<Vec<u8>>),
    BestEffort(mpsc::SyncSender<Vec<u8>>),
}

struct SubEntry {
    id: u64,
    mailbox: Mailbox,
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, Vec<SubEntry>>,
    next_sub_id: u64,
}

/// Process-local topic bus. Cheap to clone; all handles share one registry.
#[derive(Clone, Default)]
pub struct Bus {
    state: Arc<Mutex<BusState>>,
}

impl Bus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Bus::default()
    }

    /// Creates a publisher handle for `topic`.
    #[must_use]
    pub fn publisher(&self, topic: impl Into<String>) -> Publisher {
        Publisher {
            bus: self.clone(),
            topic: topic.into(),
        }
    }

    /// Subscribes `callback` to `topic`.
    ///
    /// The callback runs on a dedicated listener thread until the returned
    /// [`Subscription`] is dropped. The subscription handle must be held for
    /// the lifetime of the interest; dropping it unsubscribes.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        qos: QosProfile,
        callback: impl Fn(Vec<u8>) + Send + 'static,
    ) -> Result<Subscription, Error> {
        let topic = topic.into();
        // Both channel flavors share the same receiver type; only the
        // sender side differs (unbounded vs. buffered with try_send).
        let (mailbox, rx) = if qos.reliable {
            let (tx, rx) = mpsc::channel::<Vec<u8>>();
            (Mailbox::Reliable(tx), rx)
        } else {
            let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(qos.depth);
            (Mailbox::BestEffort(tx), rx)
        };

        let id = {
            let mut state = self.state.lock();
            state.next_sub_id += 1;
            let id = state.next_sub_id;
            state
                .topics
                .entry(topic.clone())
                .or_default()
                .push(SubEntry { id, mailbox });
            id
        };

        let thread_topic = topic.clone();
        let handle = std::thread::Builder::new()
            .name(format!("bus-sub-{thread_topic}"))
            .spawn(move || {
                while let Ok(bytes) = rx.recv() {
                    callback(bytes);
                }
            })
            .map_err(|e| {
                // Roll back the registration so publishers do not feed a
                // mailbox nobody drains.
                self.unsubscribe(&topic, id);
                Error::ListenerSpawn {
                    topic: topic.clone(),
                    details: e.to_string(),
                }
            })?;

        Ok(Subscription {
            bus: self.clone(),
            topic: thread_topic,
            id,
            handle: Some(handle),
        })
    }

    fn publish_bytes(&self, topic: &str, bytes: &[u8]) -> usize {
        let state = self.state.lock();
        let Some(subs) = state.topics.get(topic) else {
            return 0;
        };
        let mut delivered = 0;
        for sub in subs {
            let ok = match &sub.mailbox {
                Mailbox::Reliable(tx) => tx.send(bytes.to_vec()).is_ok(),
                // Best-effort: shed the message when the consumer is behind.
                Mailbox::BestEffort(tx) => tx.try_send(bytes.to_vec()).is_ok(),
            };
            if ok {
                delivered += 1;
            }
        }
        delivered
    }

    fn unsubscribe(&self, topic: &str, id: u64) {
        let mut state = self.state.lock();
        if let Some(subs) = state.topics.get_mut(topic) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                let _ = state.topics.remove(topic);
            }
        }
    }
}

/// Publisher handle bound to one topic.
#[derive(Clone)]
pub struct Publisher {
    bus: Bus,
    topic: String,
}

impl Publisher {
    /// Publishes a message, returning how many subscribers accepted it.
    /// Zero subscribers is not an error.
    pub fn publish(&self, bytes: &[u8]) -> usize {
        self.bus.publish_bytes(&self.topic, bytes)
    }

    /// Topic this publisher is bound to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Active subscription; dropping it detaches the callback and joins the
/// listener thread.
pub struct Subscription {
    bus: Bus,
    topic: String,
    id: u64,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Topic this subscription is bound to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Removing the entry drops the sender, which ends the listener loop.
        self.bus.unsubscribe(&self.topic, self.id);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus
            .subscribe("/arm/command", QosProfile::reliable(), move |bytes| {
                sink.lock().push(bytes);
            })
            .expect("subscribe");

        let publisher = bus.publisher("/arm/command");
        assert_eq!(publisher.publish(b"op=demo_echo"), 1);
        assert!(wait_until(Duration::from_secs(2), || !seen.lock().is_empty()));
        assert_eq!(seen.lock()[0], b"op=demo_echo");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = Bus::new();
        assert_eq!(bus.publisher("/nobody").publish(b"x"), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = bus
            .subscribe("t", QosProfile::reliable(), move |_| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscribe");
        let publisher = bus.publisher("t");
        assert_eq!(publisher.publish(b"1"), 1);
        assert!(wait_until(Duration::from_secs(2), || {
            hits.load(Ordering::SeqCst) == 1
        }));
        drop(sub);
        assert_eq!(publisher.publish(b"2"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fanout_to_multiple_subscribers() {
        let bus = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a_counter = Arc::clone(&hits);
        let b_counter = Arc::clone(&hits);
        let _a = bus
            .subscribe("t", QosProfile::reliable(), move |_| {
                let _ = a_counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscribe a");
        let _b = bus
            .subscribe("t", QosProfile::reliable(), move |_| {
                let _ = b_counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("subscribe b");
        assert_eq!(bus.publisher("t").publish(b"x"), 2);
        assert!(wait_until(Duration::from_secs(2), || {
            hits.load(Ordering::SeqCst) == 2
        }));
    }
}
