// SPDX-License-Identifier: Apache-2.0

//! Envelope-aware publish/subscribe helpers.

use tracing::{debug, warn};
use wxz_bus::{Bus, Publisher, QosProfile, Subscription};
use wxz_dto::EventDto;
use wxz_kv::KvMap;

/// Publisher that wraps KV payloads in envelopes bound to one topic/schema.
#[derive(Clone)]
pub struct EventDtoPublisher {
    publisher: Publisher,
    topic: String,
    schema_id: String,
    source: String,
    max_payload: usize,
}

impl EventDtoPublisher {
    /// Creates a publisher for `topic` stamping `schema_id` and `source`.
    #[must_use]
    pub fn new(
        bus: &Bus,
        topic: impl Into<String>,
        schema_id: impl Into<String>,
        source: impl Into<String>,
        max_payload: usize,
    ) -> Self {
        let topic = topic.into();
        EventDtoPublisher {
            publisher: bus.publisher(topic.clone()),
            topic,
            schema_id: schema_id.into(),
            source: source.into(),
            max_payload,
        }
    }

    /// Publishes a KV payload. The envelope `event_id` mirrors the payload
    /// `id` field when present, so correlation survives payload-agnostic
    /// consumers. Returns false when the envelope could not be encoded.
    pub fn publish_kv(&self, kv: &KvMap) -> bool {
        let mut dto = EventDto::new(self.schema_id.clone(), self.topic.clone());
        dto.payload = wxz_kv::encode(kv);
        dto.fill_meta(&self.source);
        if let Some(id) = kv.get("id") {
            if !id.is_empty() {
                dto.event_id = id.clone();
            }
        }
        self.publish(&dto)
    }

    /// Publishes a prepared envelope. Returns false on encode failure.
    pub fn publish(&self, dto: &EventDto) -> bool {
        match dto.encode(self.max_payload) {
            Ok(bytes) => {
                let _ = self.publisher.publish(&bytes);
                true
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "dto publish failed");
                false
            }
        }
    }

    /// Topic this publisher is bound to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Subscribes to envelopes on `topic`, dropping messages that fail to decode
/// or whose schema id differs from `schema_id`. Decode failures never reach
/// the callback and never crash the listener.
pub fn subscribe_event_dto(
    bus: &Bus,
    topic: &str,
    schema_id: &str,
    qos: QosProfile,
    callback: impl Fn(EventDto) + Send + 'static,
) -> Result<Subscription, wxz_bus::Error> {
    let expected_schema = schema_id.to_owned();
    let sub_topic = topic.to_owned();
    bus.subscribe(topic, qos, move |bytes| {
        let dto = match EventDto::decode(&bytes) {
            Ok(dto) => dto,
            Err(e) => {
                warn!(topic = %sub_topic, error = %e, "dto decode failed, message dropped");
                return;
            }
        };
        if dto.schema_id != expected_schema {
            debug!(
                topic = %sub_topic,
                got = %dto.schema_id,
                want = %expected_schema,
                "schema mismatch, message dropped"
            );
            return;
        }
        callback(dto);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let end = Instant::now() + Duration::from_secs(2);
        while Instant::now() < end {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_publish_kv_mirrors_id_into_event_id() {
        let bus = Bus::new();
        let seen: Arc<Mutex<Vec<EventDto>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = subscribe_event_dto(
            &bus,
            "/arm/status",
            "ws.arm_status.v1",
            QosProfile::reliable(),
            move |dto| sink.lock().push(dto),
        )
        .expect("subscribe");

        let publisher =
            EventDtoPublisher::new(&bus, "/arm/status", "ws.arm_status.v1", "test_source", 8192);
        let kv = wxz_kv::decode("id=77;op=demo_echo;ok=1");
        assert!(publisher.publish_kv(&kv));

        assert!(wait_until(|| !seen.lock().is_empty()));
        let dto = seen.lock()[0].clone();
        assert_eq!(dto.event_id, "77");
        assert_eq!(dto.source, "test_source");
        assert_eq!(dto.payload, "id=77;op=demo_echo;ok=1");
    }

    #[test]
    fn test_schema_mismatch_is_dropped() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let _sub = subscribe_event_dto(
            &bus,
            "t",
            "ws.expected.v1",
            QosProfile::reliable(),
            move |_| *sink.lock() += 1,
        )
        .expect("subscribe");

        let wrong = EventDtoPublisher::new(&bus, "t", "ws.other.v1", "s", 8192);
        let right = EventDtoPublisher::new(&bus, "t", "ws.expected.v1", "s", 8192);
        assert!(wrong.publish_kv(&wxz_kv::decode("a=1")));
        assert!(right.publish_kv(&wxz_kv::decode("a=1")));

        assert!(wait_until(|| *seen.lock() == 1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_garbage_bytes_are_dropped() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let _sub = subscribe_event_dto(
            &bus,
            "t",
            "ws.expected.v1",
            QosProfile::reliable(),
            move |_| *sink.lock() += 1,
        )
        .expect("subscribe");
        let _ = bus.publisher("t").publish(b"not an envelope");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(*seen.lock(), 0);
    }
}
