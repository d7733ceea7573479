// SPDX-License-Identifier: Apache-2.0

//! Command router: op registry, required-key enforcement, dispatch.

use crate::command::{ArmCommand, parse_arm_command};
use crate::error_codes::{ArmErrc, arm_set_error};
use std::collections::HashMap;
use tracing::warn;
use wxz_arm_sdk::ArmClient;
use wxz_kv::KvMap;

/// A command handler. Handlers are pure functions of the command and the arm
/// capability; registration happens once at startup from the composition
/// root, so dispatch reads the registry without locks.
pub type ArmHandler = fn(&ArmCommand, &dyn ArmClient) -> KvMap;

struct Route {
    required: &'static [&'static str],
    handler: ArmHandler,
}

/// Maps operation names to handlers with per-op required keys.
#[derive(Default)]
pub struct CommandRouter {
    routes: HashMap<String, Route>,
}

/// Response skeleton: echo `id` when the request carried one, always echo
/// `op`.
#[must_use]
pub fn make_base_resp(cmd: &ArmCommand) -> KvMap {
    let mut resp = KvMap::new();
    if !cmd.id.is_empty() {
        let _ = resp.insert("id".into(), cmd.id.clone());
    }
    let _ = resp.insert("op".into(), cmd.op.clone());
    resp
}

impl CommandRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        CommandRouter::default()
    }

    /// Registers `handler` under `op` with its required keys. Later
    /// registrations for the same op replace earlier ones.
    pub fn register(
        &mut self,
        op: impl Into<String>,
        required: &'static [&'static str],
        handler: ArmHandler,
    ) {
        let _ = self.routes.insert(op.into(), Route { required, handler });
    }

    /// True when a handler is registered for `op`.
    #[must_use]
    pub fn has_route(&self, op: &str) -> bool {
        self.routes.contains_key(op)
    }

    /// Validates and dispatches one command, producing the full response.
    #[must_use]
    pub fn dispatch(&self, cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
        if cmd.op.is_empty() {
            warn!("missing op");
            let mut resp = make_base_resp(cmd);
            arm_set_error(&mut resp, ArmErrc::MissingField, "missing_op");
            return resp;
        }

        let Some(route) = self.routes.get(&cmd.op) else {
            warn!(op = %cmd.op, "unknown op");
            let mut resp = make_base_resp(cmd);
            arm_set_error(&mut resp, ArmErrc::UnknownOp, "unknown_op");
            return resp;
        };

        for key in route.required {
            if !cmd.kv.contains_key(*key) {
                warn!(op = %cmd.op, key, "missing field");
                let mut resp = make_base_resp(cmd);
                arm_set_error(&mut resp, ArmErrc::MissingField, format!("missing_{key}"));
                return resp;
            }
        }

        (route.handler)(cmd, arm)
    }

    /// Parses a raw payload and dispatches it.
    #[must_use]
    pub fn dispatch_raw(&self, raw: &str, arm: &dyn ArmClient) -> KvMap {
        let cmd = parse_arm_command(raw);
        self.dispatch(&cmd, arm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes::arm_set_ok;
    use wxz_arm_sdk::{ArmResult, JointMove, JointReading, LinearMove};

    struct NullArm;

    impl ArmClient for NullArm {
        fn move_linear(&self, _req: &LinearMove) -> ArmResult {
            Ok(())
        }
        fn move_joint(&self, _req: &JointMove) -> ArmResult {
            Ok(())
        }
        fn power_on_enable(&self) -> ArmResult {
            Ok(())
        }
        fn robot_mode(&self) -> ArmResult<i32> {
            Ok(3)
        }
        fn fault_reset(&self) -> ArmResult {
            Ok(())
        }
        fn slow_speed(&self, _enable: bool) -> ArmResult {
            Ok(())
        }
        fn quick_stop(&self, _enable: bool) -> ArmResult {
            Ok(())
        }
        fn path_download(&self, _f: &str, _i: i32, _m: i32, _n: usize) -> ArmResult {
            Ok(())
        }
        fn joint_actual_pos(&self) -> ArmResult<JointReading> {
            Ok(JointReading {
                rad: [0.0; 6],
                deg: [0.0; 6],
            })
        }
        fn is_arm_ready(&self) -> bool {
            true
        }
        fn is_power_on(&self) -> bool {
            true
        }
        fn is_start_signal(&self) -> bool {
            false
        }
        fn is_stop_signal(&self) -> bool {
            false
        }
        fn is_trajectory_complete(&self) -> bool {
            true
        }
        fn is_all_trajectories_complete(&self) -> bool {
            true
        }
        fn wait_for_start(&self, _t: std::time::Duration) -> ArmResult<bool> {
            Ok(true)
        }
        fn execute_trajectory(&self, _t: std::time::Duration) -> ArmResult<bool> {
            Ok(true)
        }
        fn emergency_stop(&self) -> ArmResult {
            Ok(())
        }
    }

    fn ok_handler(cmd: &ArmCommand, _arm: &dyn ArmClient) -> KvMap {
        let mut resp = make_base_resp(cmd);
        arm_set_ok(&mut resp);
        resp
    }

    #[test]
    fn test_missing_op() {
        let router = CommandRouter::new();
        let resp = router.dispatch_raw("id=1", &NullArm);
        assert_eq!(resp.get("ok").map(String::as_str), Some("0"));
        assert_eq!(resp.get("err_code").map(String::as_str), Some("1002"));
        assert_eq!(resp.get("err").map(String::as_str), Some("missing_op"));
        assert_eq!(resp.get("id").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_unknown_op() {
        let router = CommandRouter::new();
        let resp = router.dispatch_raw("op=nope;id=2", &NullArm);
        assert_eq!(resp.get("err_code").map(String::as_str), Some("1102"));
        assert_eq!(resp.get("err").map(String::as_str), Some("unknown_op"));
        assert_eq!(resp.get("op").map(String::as_str), Some("nope"));
    }

    #[test]
    fn test_required_key_enforced_per_op() {
        let mut router = CommandRouter::new();
        router.register("needs_x", &["x"], ok_handler);
        let resp = router.dispatch_raw("op=needs_x", &NullArm);
        assert_eq!(resp.get("err").map(String::as_str), Some("missing_x"));

        let resp = router.dispatch_raw("op=needs_x;x=1", &NullArm);
        assert_eq!(resp.get("ok").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_last_registration_wins() {
        fn other_handler(cmd: &ArmCommand, _arm: &dyn ArmClient) -> KvMap {
            let mut resp = make_base_resp(cmd);
            let _ = resp.insert("which".into(), "second".into());
            arm_set_ok(&mut resp);
            resp
        }

        let mut router = CommandRouter::new();
        router.register("dup", &[], ok_handler);
        router.register("dup", &[], other_handler);
        let resp = router.dispatch_raw("op=dup", &NullArm);
        assert_eq!(resp.get("which").map(String::as_str), Some("second"));
    }
}
