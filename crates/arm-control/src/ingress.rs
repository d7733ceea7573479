// SPDX-License-Identifier: Apache-2.0

//! Ingress pipeline: bus command topic -> bounded queue -> SDK strand ->
//! status topic, with fault derivation.
//!
//! Listener callbacks run on bus threads and only enqueue. The main loop
//! owns every publisher and the node base; strand workers hand results back
//! through drain queues. One command is dispatched per spin, which preserves
//! per-publisher ordering through the single ingress lane.

use crate::command::parse_arm_command;
use crate::error_codes::ArmErrc;
use crate::router::CommandRouter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wxz_arm_sdk::ArmClient;
use wxz_bus::QosProfile;
use wxz_channel::{CmdQueue, DrainQueue, error::SendError};
use wxz_config::ArmControlConfig;
use wxz_dto::time::now_monotonic_ms;
use wxz_engine::{Executor, Strand};
use wxz_fault::{FaultStatus, Severity};
use wxz_kv::KvMap;
use wxz_node::{EventDtoPublisher, Node, subscribe_event_dto};
use wxz_telemetry::MetricsRegistry;

/// One queued raw command.
#[derive(Debug, Clone)]
pub struct Cmd {
    /// Raw KV payload as received.
    pub raw: String,
}

fn queue_full_resp() -> KvMap {
    let mut resp = KvMap::new();
    let _ = resp.insert("ok".into(), "0".into());
    let _ = resp.insert("code".into(), ArmErrc::QueueFull.code().to_string());
    let _ = resp.insert("err".into(), "queue_full".into());
    let _ = resp.insert("err_code".into(), ArmErrc::QueueFull.code().to_string());
    resp
}

fn executor_rejected_resp() -> KvMap {
    let mut resp = KvMap::new();
    let _ = resp.insert("ok".into(), "0".into());
    let _ = resp.insert("err".into(), "executor_rejected".into());
    let _ = resp.insert("code".into(), ArmErrc::InvalidArgs.code().to_string());
    let _ = resp.insert("err_code".into(), ArmErrc::InvalidArgs.code().to_string());
    resp
}

/// The arm-control main loop.
pub struct ArmControlLoop {
    node: Node,
    exec: Executor,
    arm_sdk_strand: Strand,
    router: Arc<CommandRouter>,
    arm: Arc<dyn ArmClient>,
    queue: Arc<CmdQueue<Cmd>>,
    status_pub: EventDtoPublisher,
    config: ArmControlConfig,
    metrics: MetricsRegistry,
}

impl ArmControlLoop {
    /// Wires the loop. Subscriptions are created inside [`ArmControlLoop::run`]
    /// and live for its duration.
    #[must_use]
    pub fn new(
        node: Node,
        exec: Executor,
        arm_sdk_strand: Strand,
        router: Arc<CommandRouter>,
        arm: Arc<dyn ArmClient>,
        queue: Arc<CmdQueue<Cmd>>,
        status_pub: EventDtoPublisher,
        config: ArmControlConfig,
        metrics: MetricsRegistry,
    ) -> Self {
        ArmControlLoop {
            node,
            exec,
            arm_sdk_strand,
            router,
            arm,
            queue,
            status_pub,
            config,
            metrics,
        }
    }

    fn maybe_publish_fault_from_resp(&self, resp: &KvMap) {
        let ok_s = wxz_kv::get_or(resp, "ok", "");
        let err_code = wxz_kv::parse_int(wxz_kv::get_or(resp, "err_code", "0")).unwrap_or(0);
        let err = wxz_kv::get_or(resp, "err", "");
        let sdk_code = wxz_kv::get_or(resp, "sdk_code", "");

        let ok = ok_s.is_empty() || wxz_kv::is_truthy(ok_s);
        if ok && err_code == 0 {
            return;
        }

        self.metrics.counter("arm.faults_total").inc();
        let mut fault_err = err.to_owned();
        if !sdk_code.is_empty() {
            if !fault_err.is_empty() {
                fault_err.push(' ');
            }
            fault_err.push_str(&format!("(sdk_code={sdk_code})"));
        }
        let fault = FaultStatus {
            fault: "arm.command".into(),
            service: String::new(),
            severity: Severity::Error,
            active: true,
            err_code: if err_code != 0 {
                err_code
            } else {
                wxz_kv::parse_int(wxz_kv::get_or(resp, "code", "1")).unwrap_or(1)
            },
            err: fault_err,
        };
        if !self.node.publish_fault(fault) {
            warn!("fault publish skipped (fault topic not configured)");
        }
    }

    /// Runs until the node stops. `spin_slice` bounds each executor wait.
    pub fn run(&self, spin_slice: Duration) {
        let resp_out_q: Arc<DrainQueue<KvMap>> = Arc::new(DrainQueue::new());
        let fault_out_q: Arc<DrainQueue<FaultStatus>> = Arc::new(DrainQueue::new());
        let fault_action_q: Arc<DrainQueue<KvMap>> = Arc::new(DrainQueue::new());

        // Command ingress: listener threads only enqueue; a full queue
        // produces a synthetic backpressure response and a warn fault.
        let cmd_sub = {
            let queue = Arc::clone(&self.queue);
            let resp_out = Arc::clone(&resp_out_q);
            let fault_out = Arc::clone(&fault_out_q);
            let commands_total = self.metrics.counter("arm.commands_total");
            let queue_full_total = self.metrics.counter("arm.queue_full_total");
            subscribe_event_dto(
                self.node.bus(),
                &self.config.cmd_dto_topic,
                &self.config.cmd_dto_schema,
                QosProfile::best_effort(self.config.ingress_pool_buffers).with_priority(32),
                move |dto| {
                    commands_total.inc();
                    match queue.push(Cmd { raw: dto.payload }) {
                        Ok(()) => {}
                        Err(SendError::Full(_)) => {
                            warn!("queue full, drop cmd");
                            queue_full_total.inc();
                            resp_out.push(queue_full_resp());
                            fault_out.push(FaultStatus {
                                fault: "arm.queue_full".into(),
                                service: String::new(),
                                severity: Severity::Warn,
                                active: true,
                                err_code: ArmErrc::QueueFull.code(),
                                err: "queue_full".into(),
                            });
                        }
                        Err(SendError::Closed(_)) => warn!("queue closed, drop cmd"),
                    }
                },
            )
        };
        let cmd_sub = match cmd_sub {
            Ok(sub) => sub,
            Err(e) => {
                warn!(error = %e, "command subscription failed, loop not started");
                return;
            }
        };

        // Fault actions: a reset request targeted at this service.
        let fault_action_sub = {
            let actions = Arc::clone(&fault_action_q);
            let target_service = self.config.rpc.service_name.clone();
            subscribe_event_dto(
                self.node.bus(),
                &self.config.fault_action_topic,
                "ws.fault_action.v1",
                QosProfile::reliable(),
                move |dto| {
                    let kv = wxz_kv::decode(&dto.payload);
                    if wxz_kv::get_or(&kv, "target", "") != target_service {
                        return;
                    }
                    if wxz_kv::get_or(&kv, "action", "") == "reset" {
                        info!("fault/action reset received");
                        actions.push(kv);
                    }
                },
            )
        };
        if let Err(e) = &fault_action_sub {
            warn!(error = %e, "fault action subscription failed");
        }

        let mut last_metrics_log_ms = now_monotonic_ms();

        while self.node.running() {
            self.node.tick();

            // Publish results produced on listener threads / the strand.
            while let Some(fault) = fault_out_q.try_pop() {
                if !self.node.publish_fault(fault) {
                    warn!("fault publish skipped (fault topic not configured)");
                }
            }
            while let Some(resp) = resp_out_q.try_pop() {
                self.maybe_publish_fault_from_resp(&resp);
                let _ = self.status_pub.publish_kv(&resp);
                self.metrics.counter("arm.responses_total").inc();
            }

            // Fault actions: ack from this thread, SDK work on the strand.
            while let Some(req) = fault_action_q.try_pop() {
                self.handle_fault_action(&req, &fault_out_q);
            }

            // At most one command per spin.
            self.dispatch_one_cmd(&resp_out_q);

            let _ = self.exec.spin_once(spin_slice);

            if self.config.metrics_log_ms > 0 {
                let now = now_monotonic_ms();
                if now.saturating_sub(last_metrics_log_ms) >= self.config.metrics_log_ms {
                    last_metrics_log_ms = now;
                    info!(metrics = %self.metrics.snapshot(), "metrics");
                }
            }
        }

        drop(cmd_sub);
        drop(fault_action_sub);
    }

    fn handle_fault_action(&self, req: &KvMap, fault_out_q: &Arc<DrainQueue<FaultStatus>>) {
        // Immediate ack so operators see the request was taken.
        let ack = FaultStatus {
            fault: "arm.fault_reset".into(),
            service: String::new(),
            severity: Severity::Info,
            active: false,
            err_code: 0,
            err: "fault_reset_requested".into(),
        };
        if !self.node.publish_fault(ack) {
            warn!("fault ack publish failed");
        }

        let arm = Arc::clone(&self.arm);
        let fault_out = Arc::clone(fault_out_q);
        let fault_name = wxz_kv::get_or(req, "fault", "arm.fault").to_owned();
        let queued = self.arm_sdk_strand.post(move || {
            let result = arm.fault_reset();
            let fault = match &result {
                Ok(()) => {
                    info!("fault_reset ok");
                    FaultStatus {
                        fault: fault_name,
                        service: String::new(),
                        severity: Severity::Info,
                        active: false,
                        err_code: 0,
                        err: "fault_reset_ok".into(),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "fault_reset failed");
                    FaultStatus {
                        fault: fault_name,
                        service: String::new(),
                        severity: Severity::Error,
                        active: true,
                        err_code: match e {
                            wxz_arm_sdk::ArmCallError::Sdk { code } => *code,
                            _ => ArmErrc::InternalError.code(),
                        },
                        err: "fault_reset_failed".into(),
                    }
                }
            };
            fault_out.push(fault);
        });
        if !queued {
            warn!("fault_reset dropped: arm_sdk_strand rejected task");
        }
    }

    fn dispatch_one_cmd(&self, resp_out_q: &Arc<DrainQueue<KvMap>>) {
        let Some(cmd) = self.queue.try_pop() else {
            return;
        };
        let router = Arc::clone(&self.router);
        let arm = Arc::clone(&self.arm);
        let resp_out = Arc::clone(resp_out_q);
        let queued = self.arm_sdk_strand.post(move || {
            let parsed = parse_arm_command(&cmd.raw);
            let resp = router.dispatch(&parsed, arm.as_ref());
            resp_out.push(resp);
        });
        if !queued {
            warn!("cmd dropped: arm_sdk_strand rejected task");
            resp_out_q.push(executor_rejected_resp());
        }
    }
}
