// SPDX-License-Identifier: Apache-2.0

//! Status correlation cache (last response per request id).

use crate::arm_types::{ArmResp, TraceContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wxz_bus::{Bus, QosProfile, Subscription};
use wxz_dto::time::now_monotonic_ms;
use wxz_engine::Strand;
use wxz_node::subscribe_event_dto;

// Retention: size-triggered, age-based pruning. Callers additionally bound
// growth through their per-request deadlines.
const SOFT_CAP: usize = 256;
const MAX_AGE_MS: u64 = 30_000;

/// Thread-safe map of the last response per request id.
#[derive(Default)]
pub struct ArmRespCache {
    by_id: Mutex<HashMap<String, ArmResp>>,
}

impl ArmRespCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        ArmRespCache::default()
    }

    /// Stores a response, replacing any previous one for the id. When the
    /// cache exceeds its soft cap, entries older than the retention window
    /// are pruned.
    pub fn put(&self, id: impl Into<String>, resp: ArmResp) {
        let mut by_id = self.by_id.lock();
        let _ = by_id.insert(id.into(), resp);
        Self::prune(&mut by_id, now_monotonic_ms());
    }

    fn prune(by_id: &mut HashMap<String, ArmResp>, now_ms: u64) {
        if by_id.len() > SOFT_CAP {
            let cutoff = now_ms.saturating_sub(MAX_AGE_MS);
            by_id.retain(|_, r| r.ts_ms >= cutoff);
        }
    }

    /// Looks up the response for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ArmResp> {
        self.by_id.lock().get(id).cloned()
    }

    /// Current entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.lock().len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subscribes the cache to the arm status topic.
///
/// The bus callback only decodes and hands the update to `ingress_strand`,
/// so the cache is mutated from the service's cooperative lane rather than
/// the transport thread. Responses whose payload lacks `id` are indexed by
/// the envelope `event_id`. An inbound `trace_id` updates the shared trace
/// context.
pub fn install_arm_status_cache_updater(
    bus: &Bus,
    status_topic: &str,
    status_schema: &str,
    ingress_strand: Strand,
    pool_buffers: usize,
    cache: Arc<ArmRespCache>,
    trace: Option<Arc<TraceContext>>,
) -> Result<Subscription, wxz_bus::Error> {
    subscribe_event_dto(
        bus,
        status_topic,
        status_schema,
        QosProfile::best_effort(pool_buffers),
        move |dto| {
            let cache = Arc::clone(&cache);
            let trace = trace.clone();
            let _ = ingress_strand.post(move || {
                let mut kv = wxz_kv::decode(&dto.payload);
                if let Some(trace) = &trace {
                    trace.set_if_nonempty(wxz_kv::get_or(&kv, "trace_id", ""));
                }
                if !kv.contains_key("id") && !dto.event_id.is_empty() {
                    let _ = kv.insert("id".into(), dto.event_id.clone());
                }
                let Some(id) = kv.get("id").cloned() else {
                    return;
                };
                if id.is_empty() {
                    return;
                }
                let resp = ArmResp {
                    ok: wxz_kv::get_or(&kv, "ok", "0").to_owned(),
                    code: wxz_kv::get_or(&kv, "code", "").to_owned(),
                    err_code: wxz_kv::get_or(&kv, "err_code", "").to_owned(),
                    err: wxz_kv::get_or(&kv, "err", "").to_owned(),
                    sdk_code: wxz_kv::get_or(&kv, "sdk_code", "").to_owned(),
                    ts_ms: now_monotonic_ms(),
                    kv,
                };
                cache.put(id, resp);
            });
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wxz_engine::Executor;
    use wxz_node::EventDtoPublisher;

    fn resp_at(ts_ms: u64) -> ArmResp {
        ArmResp {
            ok: "1".into(),
            ts_ms,
            ..ArmResp::default()
        }
    }

    #[test]
    fn test_put_get_overwrites() {
        let cache = ArmRespCache::new();
        cache.put("a", resp_at(1));
        let mut newer = resp_at(2);
        newer.err_code = "2001".into();
        cache.put("a", newer.clone());
        assert_eq!(cache.get("a"), Some(newer));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_retention_prunes_only_old_entries_past_cap() {
        let cache = ArmRespCache::new();
        // Entries stamped at t=0 and t=40s; prune as if the clock read 40s.
        for i in 0..300 {
            cache.put(format!("stale-{i}"), resp_at(0));
        }
        for i in 0..10 {
            cache.put(format!("fresh-{i}"), resp_at(40_000));
        }
        ArmRespCache::prune(&mut cache.by_id.lock(), 40_000);
        assert!(cache.len() <= 10);
        assert!(cache.get("fresh-0").is_some());
        assert!(cache.get("stale-0").is_none());
    }

    #[test]
    fn test_retention_keeps_fresh_entries_below_window() {
        let cache = ArmRespCache::new();
        for i in 0..300 {
            cache.put(format!("fresh-{i}"), resp_at(now_monotonic_ms()));
        }
        // Over the soft cap but nothing is stale, so nothing is dropped.
        assert_eq!(cache.len(), 300);
    }

    #[test]
    fn test_updater_indexes_by_envelope_event_id() {
        let bus = Bus::new();
        let exec = Executor::new(0);
        let strand = Strand::new(&exec);
        let cache = Arc::new(ArmRespCache::new());
        let _sub = install_arm_status_cache_updater(
            &bus,
            "/arm/status",
            "ws.arm_status.v1",
            strand,
            64,
            Arc::clone(&cache),
            None,
        )
        .expect("updater");

        // Payload without id, envelope with event_id.
        let publisher =
            EventDtoPublisher::new(&bus, "/arm/status", "ws.arm_status.v1", "arm", 8192);
        let mut dto = wxz_dto::EventDto::new("ws.arm_status.v1", "/arm/status");
        dto.payload = "ok=1;err_code=0;op=power_on_enable".into();
        dto.event_id = "env-77".into();
        dto.fill_meta("arm");
        assert!(publisher.publish(&dto));

        // Drive the strand until the entry appears.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut found = false;
        while Instant::now() < deadline {
            let _ = exec.spin_once(Duration::from_millis(2));
            if cache.get("env-77").is_some() {
                found = true;
                break;
            }
        }
        assert!(found, "entry indexed by envelope event_id");
        let resp = cache.get("env-77").expect("resp");
        assert_eq!(resp.ok, "1");
        assert_eq!(
            resp.kv.get("op").map(String::as_str),
            Some("power_on_enable")
        );
    }
}
