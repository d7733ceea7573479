// SPDX-License-Identifier: Apache-2.0

//! Client side of the RPC plane.

use crate::error::Error;
use crate::wire::{Reply, ReplyEnvelope, RequestEnvelope};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tracing::warn;
use wxz_bus::{Bus, Publisher, QosProfile, Subscription};

type Pending = Arc<Mutex<HashMap<String, mpsc::Sender<ReplyEnvelope>>>>;

/// Blocking RPC client correlating replies by request id.
pub struct RpcClient {
    request_pub: Publisher,
    pending: Pending,
    client_id: String,
    _reply_sub: Subscription,
}

impl RpcClient {
    /// Connects a client to a service's topic pair.
    pub fn connect(
        bus: &Bus,
        request_topic: &str,
        reply_topic: &str,
        client_id_prefix: &str,
    ) -> Result<Self, Error> {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let router = Arc::clone(&pending);
        let reply_sub = bus.subscribe(reply_topic, QosProfile::reliable(), move |bytes| {
            let envelope: ReplyEnvelope = match serde_json::from_slice(&bytes) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "rpc reply decode failed, message dropped");
                    return;
                }
            };
            // Replies for other clients (or timed-out calls) simply have no
            // waiter registered.
            if let Some(waiter) = router.lock().remove(&envelope.request_id) {
                let _ = waiter.send(envelope);
            }
        })?;

        Ok(RpcClient {
            request_pub: bus.publisher(request_topic),
            pending,
            client_id: format!("{client_id_prefix}-{}", uuid::Uuid::new_v4().simple()),
            _reply_sub: reply_sub,
        })
    }

    /// Calls `op` with `args`, blocking up to `timeout` for the reply.
    pub fn call(&self, op: &str, args: Value, timeout: Duration) -> Result<Reply, Error> {
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::channel();
        let _ = self.pending.lock().insert(request_id.clone(), tx);

        let request = RequestEnvelope {
            op: op.to_owned(),
            args,
            request_id: request_id.clone(),
            client_id: self.client_id.clone(),
        };
        match serde_json::to_vec(&request) {
            Ok(bytes) => {
                let _ = self.request_pub.publish(&bytes);
            }
            Err(e) => {
                let _ = self.pending.lock().remove(&request_id);
                warn!(error = %e, "rpc request encode failed");
                return Err(Error::Rejected { op: op.to_owned() });
            }
        }

        match rx.recv_timeout(timeout) {
            Ok(envelope) => Ok(Reply {
                status: envelope.status,
                result: envelope.result,
            }),
            Err(_) => {
                let _ = self.pending.lock().remove(&request_id);
                Err(Error::Timeout {
                    op: op.to_owned(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{RpcOptions, RpcServiceBuilder};
    use serde_json::json;
    use wxz_engine::{Executor, Strand};

    fn options() -> RpcOptions {
        RpcOptions {
            service_name: "arm_control".into(),
            sw_version: "dev".into(),
            domain: 0,
            request_topic: "/svc/arm_control/rpc/request".into(),
            reply_topic: "/svc/arm_control/rpc/reply".into(),
        }
    }

    #[test]
    fn test_ping_round_trip() {
        let bus = Bus::new();
        let exec = Executor::new(1);
        let strand = Strand::new(&exec);

        let mut builder = RpcServiceBuilder::new(options());
        builder.add_ping_handler("arm.ping");
        let _service = builder.start(&bus, &strand).expect("start");

        let client = RpcClient::connect(
            &bus,
            "/svc/arm_control/rpc/request",
            "/svc/arm_control/rpc/reply",
            "test",
        )
        .expect("connect");

        let reply = client
            .call("arm.ping", json!({}), Duration::from_secs(2))
            .expect("call");
        assert!(reply.status.ok);
        assert_eq!(reply.result["service"], "arm_control");
        assert_eq!(reply.result["sw_version"], "dev");
        assert!(reply.result["ts_ms"].as_u64().is_some());
        exec.stop();
    }

    #[test]
    fn test_unknown_op_is_a_status_error() {
        let bus = Bus::new();
        let exec = Executor::new(1);
        let strand = Strand::new(&exec);
        let _service = RpcServiceBuilder::new(options())
            .start(&bus, &strand)
            .expect("start");

        let client = RpcClient::connect(
            &bus,
            "/svc/arm_control/rpc/request",
            "/svc/arm_control/rpc/reply",
            "test",
        )
        .expect("connect");

        let reply = client
            .call("no.such.op", json!({}), Duration::from_secs(2))
            .expect("call");
        assert!(!reply.status.ok);
        assert_eq!(reply.status.code, 404);
        exec.stop();
    }

    #[test]
    fn test_call_times_out_without_service() {
        let bus = Bus::new();
        let client = RpcClient::connect(&bus, "req", "rep", "test").expect("connect");
        match client.call("arm.ping", json!({}), Duration::from_millis(20)) {
            Err(Error::Timeout { .. }) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_handlers_serialize_on_strand() {
        let bus = Bus::new();
        let exec = Executor::new(4);
        let strand = Strand::new(&exec);

        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let overlapped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut builder = RpcServiceBuilder::new(options());
        {
            let in_flight = Arc::clone(&in_flight);
            let overlapped = Arc::clone(&overlapped);
            builder.add_handler("slow.op", move |_| {
                use std::sync::atomic::Ordering;
                if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(2));
                let _ = in_flight.fetch_sub(1, Ordering::SeqCst);
                Reply::ok(Value::Null)
            });
        }
        let _service = builder.start(&bus, &strand).expect("start");

        let client = RpcClient::connect(
            &bus,
            "/svc/arm_control/rpc/request",
            "/svc/arm_control/rpc/reply",
            "test",
        )
        .expect("connect");
        for _ in 0..8 {
            let _ = client
                .call("slow.op", json!({}), Duration::from_secs(2))
                .expect("call");
        }
        assert!(!overlapped.load(std::sync::atomic::Ordering::SeqCst));
        exec.stop();
    }
}
