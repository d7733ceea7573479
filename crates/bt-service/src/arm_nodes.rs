// SPDX-License-Identifier: Apache-2.0

//! Arm action nodes.
//!
//! Every node follows the same activation shape: on start it mints a fresh
//! request id, stamps trace fields, publishes the command and records an
//! absolute deadline; while running it polls the correlation cache for a
//! response with its id; past the deadline it fails. Nodes that own user
//! feedback publish a one-shot system alert per activation on timeout or
//! command failure.

use crate::arm_types::{ArmResp, TraceContext, fill_trace_fields, make_id, prefer_err_code_success};
use crate::bt::{ActionNode, BehaviorTreeFactory, NodeContext, NodeStatus, StatefulAction};
use crate::status_cache::ArmRespCache;
use std::sync::Arc;
use tracing::{info, warn};
use wxz_dto::time::{now_epoch_ms, now_monotonic_ms};
use wxz_kv::KvMap;
use wxz_node::EventDtoPublisher;

/// Wiring shared by every arm node.
pub struct ArmNodeDeps {
    /// Publisher on the arm command topic.
    pub cmd_pub: EventDtoPublisher,
    /// Publisher on the system alert topic; `None` disables alerts.
    pub alert_pub: Option<EventDtoPublisher>,
    /// Correlation cache fed by the status subscription.
    pub cache: Arc<ArmRespCache>,
    /// Trace context propagated onto outbound commands.
    pub trace: Option<Arc<TraceContext>>,
    /// Default command deadline, milliseconds.
    pub default_timeout_ms: u64,
}

// Query nodes answer from controller state and get tighter deadlines.
const BOOL_QUERY_TIMEOUT_MS: u64 = 10_000;
const GETTER_TIMEOUT_MS: u64 = 5_000;

enum PollOutcome {
    Pending,
    TimedOut,
    Done(ArmResp),
}

// Per-activation command cycle: id, deadline, publish, poll, one-shot
// alert.
struct Cycle {
    deps: Arc<ArmNodeDeps>,
    op: &'static str,
    node_name: String,
    id: String,
    deadline_ms: u64,
    alert_sent: bool,
}

impl Cycle {
    fn new(deps: Arc<ArmNodeDeps>, op: &'static str, node_name: &str) -> Self {
        Cycle {
            deps,
            op,
            node_name: node_name.to_owned(),
            id: String::new(),
            deadline_ms: 0,
            alert_sent: false,
        }
    }

    fn begin(&mut self, timeout_ms: u64) {
        self.id = make_id();
        self.deadline_ms = now_monotonic_ms() + timeout_ms;
        self.alert_sent = false;
    }

    fn clear(&mut self) {
        self.id.clear();
        self.deadline_ms = 0;
    }

    // Publishes the command with op/id/trace fields leading the payload.
    fn publish_cmd(&self, extra: KvMap) -> bool {
        let mut kv = KvMap::new();
        let _ = kv.insert("op".into(), self.op.to_owned());
        let _ = kv.insert("id".into(), self.id.clone());
        fill_trace_fields(&mut kv, self.deps.trace.as_deref(), &self.id);
        for (k, v) in extra {
            let _ = kv.insert(k, v);
        }
        self.deps.cmd_pub.publish_kv(&kv)
    }

    fn poll(&self) -> PollOutcome {
        if now_monotonic_ms() > self.deadline_ms {
            return PollOutcome::TimedOut;
        }
        match self.deps.cache.get(&self.id) {
            Some(resp) => PollOutcome::Done(resp),
            None => PollOutcome::Pending,
        }
    }

    fn publish_alert_once(&mut self, error_code: &str, message: &str, resp: Option<&ArmResp>) {
        if self.alert_sent {
            return;
        }
        self.alert_sent = true;
        let Some(alert_pub) = &self.deps.alert_pub else {
            return;
        };

        let mut kv = KvMap::new();
        let _ = kv.insert("alert_level".into(), "ERROR".into());
        let _ = kv.insert("node_name".into(), self.node_name.clone());
        let _ = kv.insert("error_code".into(), error_code.to_owned());
        let _ = kv.insert("message".into(), message.to_owned());
        let _ = kv.insert("op".into(), self.op.to_owned());
        let _ = kv.insert("id".into(), self.id.clone());
        let _ = kv.insert("ts_ms".into(), now_epoch_ms().to_string());
        fill_trace_fields(&mut kv, self.deps.trace.as_deref(), &self.id);
        if let Some(resp) = resp {
            if !resp.sdk_code.is_empty() {
                let _ = kv.insert("sdk_code".into(), resp.sdk_code.clone());
            }
            if !resp.err_code.is_empty() {
                let _ = kv.insert("arm_err_code".into(), resp.err_code.clone());
            }
            if !resp.err.is_empty() {
                let _ = kv.insert("arm_err".into(), resp.err.clone());
            }
            if !resp.code.is_empty() {
                let _ = kv.insert("arm_code".into(), resp.code.clone());
            }
        }

        if alert_pub.publish_kv(&kv) {
            info!(
                code = error_code,
                op = self.op,
                node = %self.node_name,
                id = %self.id,
                "arm alert published"
            );
        }
    }
}

fn timeout_from_port(ctx: &NodeContext, default_ms: u64) -> u64 {
    ctx.input("timeout_ms")
        .and_then(|v| if v.is_empty() { None } else { v.parse().ok() })
        .unwrap_or(default_ms)
}

/// Linear move with bad-input and execution alerts.
struct ArmMoveLAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmMoveLAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, self.cycle.deps.default_timeout_ms));

        let pose = self.ctx.input("pose").unwrap_or_default();
        let jointpos = self.ctx.input("jointpos").unwrap_or_default();
        if pose.is_empty() || jointpos.is_empty() {
            let missing = if pose.is_empty() { "pose" } else { "jointpos" };
            self.cycle.publish_alert_once(
                "E_ARM_BAD_INPUT",
                &format!("missing required input: {missing}"),
                None,
            );
            return NodeStatus::Failure;
        }

        let mut kv = KvMap::new();
        let _ = kv.insert("pose".into(), pose);
        let _ = kv.insert("jointpos".into(), jointpos);
        let _ = kv.insert(
            "speed".into(),
            self.ctx.input("speed").unwrap_or_else(|| "30".into()),
        );
        let _ = kv.insert(
            "acc".into(),
            self.ctx.input("acc").unwrap_or_else(|| "30".into()),
        );
        let _ = kv.insert(
            "jerk".into(),
            self.ctx.input("jerk").unwrap_or_else(|| "60".into()),
        );

        if !self.cycle.publish_cmd(kv) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => {
                self.cycle.publish_alert_once(
                    "E_ARM_TIMEOUT",
                    "timeout waiting for /arm/status",
                    None,
                );
                NodeStatus::Failure
            }
            PollOutcome::Done(resp) => {
                if prefer_err_code_success(&resp.ok, &resp.err_code) {
                    NodeStatus::Success
                } else {
                    self.cycle
                        .publish_alert_once("E_ARM_EXEC_FAIL", "arm command failed", Some(&resp));
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Power-up with its own alert codes.
struct ArmPowerOnAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmPowerOnAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, self.cycle.deps.default_timeout_ms));
        if !self.cycle.publish_cmd(KvMap::new()) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => {
                self.cycle.publish_alert_once(
                    "E_ARM_POWER_ON_TIMEOUT",
                    "timeout waiting for /arm/status",
                    None,
                );
                NodeStatus::Failure
            }
            PollOutcome::Done(resp) => {
                if prefer_err_code_success(&resp.ok, &resp.err_code) {
                    NodeStatus::Success
                } else {
                    self.cycle.publish_alert_once(
                        "E_ARM_POWER_ON_FAIL",
                        "arm power_on_enable failed",
                        Some(&resp),
                    );
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Trajectory file download.
struct ArmPathDownloadAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmPathDownloadAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, self.cycle.deps.default_timeout_ms));

        let mut kv = KvMap::new();
        let _ = kv.insert("file".into(), self.ctx.input("file").unwrap_or_default());
        let _ = kv.insert(
            "index".into(),
            self.ctx.input("index").unwrap_or_else(|| "1".into()),
        );
        let _ = kv.insert(
            "moveType".into(),
            self.ctx.input("moveType").unwrap_or_else(|| "1".into()),
        );
        let _ = kv.insert(
            "maxPoints".into(),
            self.ctx.input("maxPoints").unwrap_or_else(|| "10000".into()),
        );

        if !self.cycle.publish_cmd(kv) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => {
                self.cycle.publish_alert_once(
                    "E_ARM_TIMEOUT",
                    "timeout waiting for /arm/status",
                    None,
                );
                NodeStatus::Failure
            }
            PollOutcome::Done(resp) => {
                if prefer_err_code_success(&resp.ok, &resp.err_code) {
                    NodeStatus::Success
                } else {
                    self.cycle
                        .publish_alert_once("E_ARM_EXEC_FAIL", "arm command failed", Some(&resp));
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Joint move; quiet (no alerts), outcome only.
struct ArmMoveJAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmMoveJAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, self.cycle.deps.default_timeout_ms));

        let mut kv = KvMap::new();
        let _ = kv.insert(
            "jointpos".into(),
            self.ctx.input("jointpos").unwrap_or_default(),
        );
        let _ = kv.insert(
            "speed".into(),
            self.ctx.input("speed").unwrap_or_else(|| "3.14".into()),
        );

        if !self.cycle.publish_cmd(kv) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => NodeStatus::Failure,
            PollOutcome::Done(resp) => {
                if prefer_err_code_success(&resp.ok, &resp.err_code) {
                    NodeStatus::Success
                } else {
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Fire-and-correlate op with optional `enable`/`timeout_ms` ports.
struct ArmSimpleOpAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmSimpleOpAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, self.cycle.deps.default_timeout_ms));

        let mut kv = KvMap::new();
        if let Some(enable) = self.ctx.input("enable") {
            let _ = kv.insert("enable".into(), enable);
        }
        if let Some(timeout) = self.ctx.input("timeout_ms") {
            if !timeout.is_empty() {
                let _ = kv.insert("timeout_ms".into(), timeout);
            }
        }

        if !self.cycle.publish_cmd(kv) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => NodeStatus::Failure,
            PollOutcome::Done(resp) => {
                if prefer_err_code_success(&resp.ok, &resp.err_code) {
                    NodeStatus::Success
                } else {
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Boolean query: success requires both a successful response and
/// `value=1`.
struct ArmBoolQueryAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmBoolQueryAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, BOOL_QUERY_TIMEOUT_MS));

        let mut kv = KvMap::new();
        if let Some(timeout) = self.ctx.input("timeout_ms") {
            if !timeout.is_empty() {
                let _ = kv.insert("timeout_ms".into(), timeout);
            }
        }

        if !self.cycle.publish_cmd(kv) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => NodeStatus::Failure,
            PollOutcome::Done(resp) => {
                if !prefer_err_code_success(&resp.ok, &resp.err_code) {
                    return NodeStatus::Failure;
                }
                let value = wxz_kv::get_or(&resp.kv, "value", "0");
                if wxz_kv::is_truthy(value) {
                    NodeStatus::Success
                } else {
                    NodeStatus::Failure
                }
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Mode query writing its result to the `mode` output port.
struct ArmGetRobotModeAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmGetRobotModeAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, GETTER_TIMEOUT_MS));
        if !self.cycle.publish_cmd(KvMap::new()) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => NodeStatus::Failure,
            PollOutcome::Done(resp) => {
                if !prefer_err_code_success(&resp.ok, &resp.err_code) {
                    return NodeStatus::Failure;
                }
                let mode = wxz_kv::get_or(&resp.kv, "mode", "");
                self.ctx.set_output("mode", mode);
                NodeStatus::Success
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Joint-position query writing radians to the `jointpos` output port.
struct ArmGetJointActualPosAction {
    ctx: NodeContext,
    cycle: Cycle,
}

impl StatefulAction for ArmGetJointActualPosAction {
    fn on_start(&mut self) -> NodeStatus {
        self.cycle
            .begin(timeout_from_port(&self.ctx, GETTER_TIMEOUT_MS));
        if !self.cycle.publish_cmd(KvMap::new()) {
            return NodeStatus::Failure;
        }
        NodeStatus::Running
    }

    fn on_running(&mut self) -> NodeStatus {
        match self.cycle.poll() {
            PollOutcome::Pending => NodeStatus::Running,
            PollOutcome::TimedOut => NodeStatus::Failure,
            PollOutcome::Done(resp) => {
                if !prefer_err_code_success(&resp.ok, &resp.err_code) {
                    return NodeStatus::Failure;
                }
                let jointpos = wxz_kv::get_or(&resp.kv, "jointpos", "");
                if jointpos.is_empty() {
                    return NodeStatus::Failure;
                }
                self.ctx.set_output("jointpos", jointpos);
                let jointpos_deg = wxz_kv::get_or(&resp.kv, "jointpos_deg", "");
                if jointpos_deg.is_empty() {
                    warn!(id = %self.cycle.id, "joint reading missing degree rendering");
                }
                NodeStatus::Success
            }
        }
    }

    fn on_halted(&mut self) {
        self.cycle.clear();
    }
}

/// Registers every arm node type (conventional and snake_case names).
pub fn register_arm_control_nodes(factory: &mut BehaviorTreeFactory, deps: Arc<ArmNodeDeps>) {
    macro_rules! register_as {
        ($node:ident, $op:expr, [$($type_name:expr),+ $(,)?]) => {
            $(
                {
                    let deps = Arc::clone(&deps);
                    factory.register($type_name, move |name, ctx| {
                        Box::new(ActionNode::new(
                            name,
                            Box::new($node {
                                ctx: ctx.clone(),
                                cycle: Cycle::new(Arc::clone(&deps), $op, name),
                            }),
                        ))
                    });
                }
            )+
        };
    }

    register_as!(ArmPowerOnAction, "power_on_enable", ["ArmPowerOn", "PowerOn"]);
    register_as!(ArmMoveLAction, "moveL", ["ArmMoveL", "MoveL"]);
    register_as!(ArmMoveJAction, "moveJoint", ["ArmMoveJ", "MoveJ"]);
    register_as!(
        ArmPathDownloadAction,
        "path_download",
        ["ArmPathDownload", "PathDownload"]
    );

    register_as!(ArmSimpleOpAction, "slowSpeed", ["SlowSpeed", "slowSpeed", "slow_speed"]);
    register_as!(ArmSimpleOpAction, "quickStop", ["QuickStop", "quickStop", "quick_stop"]);
    register_as!(ArmSimpleOpAction, "fault_reset", ["FaultReset", "fault_reset"]);
    register_as!(ArmSimpleOpAction, "reset_system", ["ResetSystem", "reset_system"]);
    register_as!(
        ArmSimpleOpAction,
        "emergency_stop",
        ["EmergencyStop", "emergency_stop"]
    );
    register_as!(
        ArmSimpleOpAction,
        "wait_for_start",
        ["WaitForStart", "wait_for_start"]
    );
    register_as!(
        ArmSimpleOpAction,
        "execute_trajectory",
        ["ExecuteTrajectory", "execute_trajectory"]
    );

    register_as!(ArmBoolQueryAction, "is_arm_ready", ["IsArmReady", "is_arm_ready"]);
    register_as!(ArmBoolQueryAction, "is_power_on", ["IsPowerOn", "is_power_on"]);
    register_as!(
        ArmBoolQueryAction,
        "is_start_signal",
        ["IsStartSignal", "is_start_signal"]
    );
    register_as!(
        ArmBoolQueryAction,
        "is_stop_signal",
        ["IsStopSignal", "is_stop_signal"]
    );
    register_as!(
        ArmBoolQueryAction,
        "is_trajectory_complete",
        ["IsTrajectoryComplete", "is_trajectory_complete"]
    );
    register_as!(
        ArmBoolQueryAction,
        "is_all_trajectories_complete",
        ["IsAllTrajectoriesComplete", "is_all_trajectories_complete"]
    );

    register_as!(
        ArmGetRobotModeAction,
        "robot_mode",
        ["GetRobotMode", "get_robot_mode"]
    );
    register_as!(
        ArmGetJointActualPosAction,
        "get_joint_actual_pos",
        ["ArmGetJointActualPos", "GetJointActualPos", "get_joint_actual_pos"]
    );
}
