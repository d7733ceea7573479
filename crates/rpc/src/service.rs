// SPDX-License-Identifier: Apache-2.0

//! Service side of the RPC plane.

use crate::error::Error;
use crate::wire::{Reply, ReplyEnvelope, RequestEnvelope, Status};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use wxz_bus::{Bus, Publisher, QosProfile, Subscription};
use wxz_engine::Strand;

/// Handler invoked for one operation. Runs on the bound strand.
pub type Handler = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

/// Identity of an RPC service instance.
#[derive(Debug, Clone)]
pub struct RpcOptions {
    /// Service name reported by ping.
    pub service_name: String,
    /// Software version reported by ping.
    pub sw_version: String,
    /// Bus domain reported by ping.
    pub domain: i32,
    /// Request topic.
    pub request_topic: String,
    /// Reply topic.
    pub reply_topic: String,
}

/// Builder collecting handlers before the service starts.
///
/// Registration is last-write-wins per op; the map is frozen at start so
/// dispatch reads it without locks.
pub struct RpcServiceBuilder {
    options: RpcOptions,
    handlers: HashMap<String, Handler>,
}

impl RpcServiceBuilder {
    /// Creates a builder for the given identity.
    #[must_use]
    pub fn new(options: RpcOptions) -> Self {
        RpcServiceBuilder {
            options,
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under `op`, replacing any earlier binding.
    pub fn add_handler(&mut self, op: impl Into<String>, handler: impl Fn(&Value) -> Reply + Send + Sync + 'static) {
        let _ = self.handlers.insert(op.into(), Arc::new(handler));
    }

    /// Registers the conventional ping handler under `op`.
    pub fn add_ping_handler(&mut self, op: impl Into<String>) {
        let service = self.options.service_name.clone();
        let sw_version = self.options.sw_version.clone();
        let domain = self.options.domain;
        self.add_handler(op, move |_args| {
            Reply::ok(json!({
                "service": service,
                "sw_version": sw_version,
                "domain": domain,
                "ts_ms": wxz_dto::time::now_epoch_ms(),
            }))
        });
    }

    /// Starts the service: subscribes the request topic and dispatches each
    /// request onto `strand`. The returned instance must be held for the
    /// lifetime of the service.
    pub fn start(self, bus: &Bus, strand: &Strand) -> Result<RpcService, Error> {
        let RpcServiceBuilder { options, handlers } = self;
        let handlers = Arc::new(handlers);
        let reply_pub = bus.publisher(options.reply_topic.clone());
        let strand = strand.clone();
        let service_name = options.service_name.clone();

        let dispatch_handlers = Arc::clone(&handlers);
        let dispatch_reply = reply_pub.clone();
        let subscription = bus.subscribe(
            options.request_topic.clone(),
            QosProfile::reliable(),
            move |bytes| {
                let request: RequestEnvelope = match serde_json::from_slice(&bytes) {
                    Ok(req) => req,
                    Err(e) => {
                        warn!(error = %e, "rpc request decode failed, message dropped");
                        return;
                    }
                };
                let handlers = Arc::clone(&dispatch_handlers);
                let reply_pub = dispatch_reply.clone();
                let op = request.op.clone();
                let accepted = strand.post(move || {
                    let reply = match handlers.get(&request.op) {
                        Some(handler) => handler(&request.args),
                        None => Reply::error(404, format!("unknown_op.{}", request.op)),
                    };
                    publish_reply(&reply_pub, &request.request_id, reply);
                });
                if !accepted {
                    warn!(op = %op, "rpc request dropped: strand rejected task");
                }
            },
        )?;

        info!(
            service = %service_name,
            request_topic = %options.request_topic,
            reply_topic = %options.reply_topic,
            "rpc service started"
        );
        Ok(RpcService {
            _options: options,
            _subscription: subscription,
        })
    }
}

fn publish_reply(reply_pub: &Publisher, request_id: &str, reply: Reply) {
    let envelope = ReplyEnvelope {
        request_id: request_id.to_owned(),
        status: reply.status,
        result: reply.result,
    };
    match serde_json::to_vec(&envelope) {
        Ok(bytes) => {
            let _ = reply_pub.publish(&bytes);
        }
        Err(e) => {
            warn!(error = %e, "rpc reply encode failed");
            // Last resort so the caller is not left waiting on its timeout.
            let fallback = ReplyEnvelope {
                request_id: request_id.to_owned(),
                status: Status::error(500, "reply_encode_failed"),
                result: Value::Null,
            };
            if let Ok(bytes) = serde_json::to_vec(&fallback) {
                let _ = reply_pub.publish(&bytes);
            }
        }
    }
}

/// Running RPC service instance. Dropping it stops serving.
pub struct RpcService {
    _options: RpcOptions,
    _subscription: Subscription,
}
