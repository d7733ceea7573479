// SPDX-License-Identifier: Apache-2.0

//! Service lifecycle and periodic status publishing.

use crate::dto_channel::EventDtoPublisher;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::warn;
use wxz_bus::Bus;
use wxz_dto::time::now_monotonic_ms;
use wxz_fault::FaultStatus;
use wxz_kv::KvMap;

/// Identity and wiring of a service node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Service name, stamped on envelopes and fault events.
    pub service: String,
    /// Node type announced in capability messages, e.g. `device.arm`.
    pub node_type: String,
    /// Software version announced in capability messages.
    pub version: String,
    /// Bus domain id (carried for parity with the deployment transport).
    pub domain: i32,
    /// Health file touched on tick; empty disables.
    pub health_file: String,
    /// Capability topic; empty disables capability publishing.
    pub capability_topic: String,
    /// Fault topic; empty disables fault publishing.
    pub fault_topic: String,
    /// Heartbeat topic; empty disables heartbeats.
    pub heartbeat_topic: String,
    /// Time-sync topic; empty disables time-sync publishing.
    pub timesync_topic: String,
    /// Period for heartbeat/capability publications, milliseconds.
    pub heartbeat_period_ms: u64,
    /// Payload cap for node status envelopes.
    pub dto_max_payload: usize,
}

struct Periodic {
    last_beat_ms: u64,
}

/// Node base: running flag, exit code, periodic status, fault publishing.
///
/// Cheap to clone; clones share state, so listener callbacks can hold a
/// handle to request a stop.
#[derive(Clone)]
pub struct Node {
    bus: Bus,
    config: Arc<NodeConfig>,
    running: Arc<AtomicBool>,
    exit_code: Arc<AtomicI32>,
    capability_pub: Option<EventDtoPublisher>,
    heartbeat_pub: Option<EventDtoPublisher>,
    timesync_pub: Option<EventDtoPublisher>,
    fault_pub: Option<EventDtoPublisher>,
    periodic: Arc<Mutex<Periodic>>,
}

impl Node {
    /// Creates a node over `bus` with the given identity.
    #[must_use]
    pub fn new(bus: Bus, config: NodeConfig) -> Self {
        let make_pub = |topic: &str, schema: &str| {
            if topic.is_empty() {
                None
            } else {
                Some(EventDtoPublisher::new(
                    &bus,
                    topic,
                    schema,
                    &config.service,
                    config.dto_max_payload,
                ))
            }
        };
        let capability_pub = make_pub(&config.capability_topic, "ws.capability.v1");
        let heartbeat_pub = make_pub(&config.heartbeat_topic, "ws.heartbeat.v1");
        let timesync_pub = make_pub(&config.timesync_topic, "ws.timesync.v1");
        let fault_pub = make_pub(&config.fault_topic, "ws.fault_status.v1");
        Node {
            bus,
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(true)),
            exit_code: Arc::new(AtomicI32::new(0)),
            capability_pub,
            heartbeat_pub,
            timesync_pub,
            fault_pub,
            periodic: Arc::new(Mutex::new(Periodic { last_beat_ms: 0 })),
        }
    }

    /// Bus this node is attached to.
    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Node configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// True until a stop is requested.
    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests a graceful stop; main loops observe [`Node::running`].
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Stores the process exit code reported after the main loop unwinds.
    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::Release);
    }

    /// Exit code to report; zero unless something stored a failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    /// Periodic work: heartbeat + capability publications and the health
    /// file touch, throttled to the configured period. Call once per main
    /// loop iteration.
    pub fn tick(&self) {
        let now = now_monotonic_ms();
        {
            let mut periodic = self.periodic.lock();
            if now.saturating_sub(periodic.last_beat_ms) < self.config.heartbeat_period_ms {
                return;
            }
            periodic.last_beat_ms = now;
        }

        if let Some(hb) = &self.heartbeat_pub {
            let mut kv = KvMap::new();
            let _ = kv.insert("service".into(), self.config.service.clone());
            let _ = kv.insert("ts_ms".into(), wxz_dto::time::now_epoch_ms().to_string());
            let _ = hb.publish_kv(&kv);
        }
        if let Some(cap) = &self.capability_pub {
            let mut kv = KvMap::new();
            let _ = kv.insert("service".into(), self.config.service.clone());
            let _ = kv.insert("type".into(), self.config.node_type.clone());
            let _ = kv.insert("version".into(), self.config.version.clone());
            let _ = kv.insert("domain".into(), self.config.domain.to_string());
            let _ = cap.publish_kv(&kv);
        }
        if let Some(ts) = &self.timesync_pub {
            // Epoch/monotonic pair so peers can line up their local offsets.
            let mut kv = KvMap::new();
            let _ = kv.insert("service".into(), self.config.service.clone());
            let _ = kv.insert("epoch_ms".into(), wxz_dto::time::now_epoch_ms().to_string());
            let _ = kv.insert("mono_ms".into(), now.to_string());
            let _ = ts.publish_kv(&kv);
        }
        if !self.config.health_file.is_empty() {
            if let Err(e) = std::fs::write(&self.config.health_file, b"ok\n") {
                warn!(file = %self.config.health_file, error = %e, "health file touch failed");
            }
        }
    }

    /// Publishes a fault event, stamping this node's service name. Returns
    /// false when no fault topic is configured.
    pub fn publish_fault(&self, mut fault: FaultStatus) -> bool {
        let Some(fault_pub) = &self.fault_pub else {
            return false;
        };
        if fault.service.is_empty() {
            fault.service = self.config.service.clone();
        }
        fault_pub.publish_kv(&fault.to_kv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto_channel::subscribe_event_dto;
    use wxz_bus::QosProfile;
    use wxz_fault::Severity;

    fn test_config() -> NodeConfig {
        NodeConfig {
            service: "svc_under_test".into(),
            node_type: "device.test".into(),
            version: "dev".into(),
            domain: 0,
            health_file: String::new(),
            capability_topic: "capability/status".into(),
            fault_topic: "fault/status".into(),
            heartbeat_topic: "heartbeat/status".into(),
            timesync_topic: String::new(),
            heartbeat_period_ms: 1000,
            dto_max_payload: 8192,
        }
    }

    #[test]
    fn test_running_flag_and_exit_code() {
        let node = Node::new(Bus::new(), test_config());
        assert!(node.running());
        assert_eq!(node.exit_code(), 0);
        node.set_exit_code(77);
        node.request_stop();
        assert!(!node.running());
        assert_eq!(node.exit_code(), 77);
    }

    #[test]
    fn test_publish_fault_stamps_service() {
        let bus = Bus::new();
        let node = Node::new(bus.clone(), test_config());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = subscribe_event_dto(
            &bus,
            "fault/status",
            "ws.fault_status.v1",
            QosProfile::reliable(),
            move |dto| sink.lock().push(dto),
        )
        .expect("subscribe");

        assert!(node.publish_fault(FaultStatus {
            fault: "arm.command".into(),
            severity: Severity::Error,
            active: true,
            err_code: 2001,
            err: "sdk_call_failed".into(),
            ..FaultStatus::default()
        }));

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while seen.lock().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let dto = seen.lock()[0].clone();
        let event = FaultStatus::from_kv(&wxz_kv::decode(&dto.payload));
        assert_eq!(event.service, "svc_under_test");
        assert_eq!(event.err_code, 2001);
    }

    #[test]
    fn test_publish_fault_without_topic_is_refused() {
        let mut config = test_config();
        config.fault_topic = String::new();
        let node = Node::new(Bus::new(), config);
        assert!(!node.publish_fault(FaultStatus::default()));
    }
}
