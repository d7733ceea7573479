// SPDX-License-Identifier: Apache-2.0

//! Built-in command handlers and their registration.
//!
//! Each handler validates its own numeric fields (the router has already
//! checked presence of required keys), calls into the [`ArmClient`]
//! capability, and folds the outcome into a KV response.

use crate::command::ArmCommand;
use crate::error_codes::{ArmErrc, arm_apply_result, arm_set_error, arm_set_ok, arm_set_sdk_result};
use crate::router::{CommandRouter, make_base_resp};
use std::time::Duration;
use tracing::{error, info, warn};
use wxz_arm_sdk::{ArmClient, JointMove, LinearMove};
use wxz_kv::KvMap;

// Present-but-unparseable numeric fields are reported as `bad_<key>`;
// absent optional fields take the default.
fn opt_double(cmd: &ArmCommand, key: &str, def: f64) -> Result<f64, String> {
    match cmd.kv.get(key) {
        None => Ok(def),
        Some(v) => wxz_kv::parse_double(v).ok_or_else(|| format!("bad_{key}")),
    }
}

fn opt_u64(cmd: &ArmCommand, key: &str, def: u64) -> u64 {
    cmd.kv
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(def)
}

fn opt_i32(cmd: &ArmCommand, key: &str, def: i32) -> i32 {
    cmd.kv
        .get(key)
        .and_then(|v| wxz_kv::parse_int(v))
        .unwrap_or(def)
}

fn opt_size(cmd: &ArmCommand, key: &str, def: usize) -> usize {
    cmd.kv
        .get(key)
        .and_then(|v| wxz_kv::parse_size(v))
        .unwrap_or(def)
}

fn unit_override(cmd: &ArmCommand) -> bool {
    cmd.kv
        .get("unit_override")
        .is_some_and(|v| wxz_kv::is_truthy(v))
}

fn h_move_l(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);

    let pose = wxz_kv::get_or(&cmd.kv, "pose", "");
    let jointpos = wxz_kv::get_or(&cmd.kv, "jointpos", "");
    let (Some(pose), Some(jointpos)) = (wxz_kv::parse_csv6(pose), wxz_kv::parse_csv6(jointpos))
    else {
        warn!("moveL bad pose or jointpos");
        arm_set_error(&mut resp, ArmErrc::ParseError, "bad_pose_or_jointpos");
        return resp;
    };

    let speed = match opt_double(cmd, "speed", 30.0) {
        Ok(v) => v,
        Err(err) => {
            arm_set_error(&mut resp, ArmErrc::ParseError, err);
            return resp;
        }
    };
    let acc = match opt_double(cmd, "acc", 30.0) {
        Ok(v) => v,
        Err(err) => {
            arm_set_error(&mut resp, ArmErrc::ParseError, err);
            return resp;
        }
    };
    let jerk = match opt_double(cmd, "jerk", 60.0) {
        Ok(v) => v,
        Err(err) => {
            arm_set_error(&mut resp, ArmErrc::ParseError, err);
            return resp;
        }
    };

    let result = arm.move_linear(&LinearMove {
        jointpos_rad: jointpos,
        pose,
        speed_mm_s: speed,
        acc,
        jerk,
        unit_override: unit_override(cmd),
    });
    arm_apply_result(&mut resp, &result);
    if let Err(e) = result {
        error!(error = %e, "moveL failed");
    }
    resp
}

fn h_move_joint(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);

    let Some(jointpos) = wxz_kv::parse_csv6(wxz_kv::get_or(&cmd.kv, "jointpos", "")) else {
        warn!("moveJoint bad jointpos");
        arm_set_error(&mut resp, ArmErrc::ParseError, "bad_jointpos");
        return resp;
    };
    let speed = match opt_double(cmd, "speed", 3.14) {
        Ok(v) => v,
        Err(err) => {
            arm_set_error(&mut resp, ArmErrc::ParseError, err);
            return resp;
        }
    };

    let result = arm.move_joint(&JointMove {
        jointpos_rad: jointpos,
        speed_rad_s: speed,
        unit_override: unit_override(cmd),
    });
    arm_apply_result(&mut resp, &result);
    if let Err(e) = result {
        error!(error = %e, "moveJoint failed");
    }
    resp
}

fn h_power_on(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let result = arm.power_on_enable();
    arm_apply_result(&mut resp, &result);
    if let Err(e) = result {
        error!(error = %e, "power_on failed");
    }
    resp
}

fn h_fault_reset(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let result = arm.fault_reset();
    arm_apply_result(&mut resp, &result);
    if let Err(e) = result {
        error!(error = %e, "fault_reset failed");
    }
    resp
}

fn h_slow_speed(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let enable = wxz_kv::is_truthy(wxz_kv::get_or(&cmd.kv, "enable", "1"));
    arm_apply_result(&mut resp, &arm.slow_speed(enable));
    resp
}

fn h_quick_stop(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let enable = wxz_kv::is_truthy(wxz_kv::get_or(&cmd.kv, "enable", "1"));
    arm_apply_result(&mut resp, &arm.quick_stop(enable));
    resp
}

fn h_path_download(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let file = wxz_kv::get_or(&cmd.kv, "file", "");
    if file.is_empty() {
        warn!("path_download missing file");
        arm_set_error(&mut resp, ArmErrc::MissingField, "missing_file");
        return resp;
    }
    let index = opt_i32(cmd, "index", 1);
    let move_type = opt_i32(cmd, "moveType", 1);
    let max_points = opt_size(cmd, "maxPoints", 10_000);

    let result = arm.path_download(file, index, move_type, max_points);
    arm_apply_result(&mut resp, &result);
    if let Err(e) = result {
        error!(error = %e, file, "path_download failed");
    }
    resp
}

fn h_demo_echo(cmd: &ArmCommand, _arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let msg = wxz_kv::get_or(&cmd.kv, "msg", "");
    info!(msg, "demo_echo");
    let _ = resp.insert("echo".into(), msg.to_owned());
    arm_set_ok(&mut resp);
    resp
}

fn h_robot_mode(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    match arm.robot_mode() {
        Ok(mode) => {
            arm_set_sdk_result(&mut resp, 0);
            let _ = resp.insert("mode".into(), mode.to_string());
            info!(mode, "robot_mode");
        }
        Err(e) => {
            arm_apply_result(&mut resp, &Err(e));
            error!(error = %e, "robot_mode query failed");
        }
    }
    resp
}

fn h_get_joint_actual_pos(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    match arm.joint_actual_pos() {
        Ok(reading) => {
            arm_set_sdk_result(&mut resp, 0);
            // jointpos is radians so it can feed straight back into
            // moveJ/moveL; the degree rendering is for debugging.
            let _ = resp.insert("jointpos".into(), wxz_kv::format_csv6_fixed(&reading.rad, 6));
            let _ = resp.insert(
                "jointpos_deg".into(),
                wxz_kv::format_csv6_fixed(&reading.deg, 6),
            );
        }
        Err(e) => arm_apply_result(&mut resp, &Err(e)),
    }
    resp
}

macro_rules! bool_query_handler {
    ($name:ident, $method:ident) => {
        fn $name(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
            let mut resp = make_base_resp(cmd);
            let value = arm.$method();
            let wire = if value { "1" } else { "0" };
            let _ = resp.insert("value".into(), wire.into());
            arm_set_ok(&mut resp);
            resp
        }
    };
}

bool_query_handler!(h_is_arm_ready, is_arm_ready);
bool_query_handler!(h_is_power_on, is_power_on);
bool_query_handler!(h_is_start_signal, is_start_signal);
bool_query_handler!(h_is_stop_signal, is_stop_signal);
bool_query_handler!(h_is_trajectory_complete, is_trajectory_complete);
bool_query_handler!(h_is_all_trajectories_complete, is_all_trajectories_complete);

fn h_wait_for_start(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let timeout_ms = opt_u64(cmd, "timeout_ms", 30_000);
    let started = arm
        .wait_for_start(Duration::from_millis(timeout_ms))
        .unwrap_or(false);
    // Transport success is reported via ok=1; the wait outcome travels in
    // value so behavior-tree callers can branch on it.
    let wire = if started { "1" } else { "0" };
    let _ = resp.insert("value".into(), wire.into());
    arm_set_ok(&mut resp);
    resp
}

fn h_execute_trajectory(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    let timeout_ms = opt_u64(cmd, "timeout_ms", 60_000);
    let completed = arm
        .execute_trajectory(Duration::from_millis(timeout_ms))
        .unwrap_or(false);
    let wire = if completed { "1" } else { "0" };
    let _ = resp.insert("value".into(), wire.into());
    arm_set_ok(&mut resp);
    resp
}

fn h_emergency_stop(cmd: &ArmCommand, arm: &dyn ArmClient) -> KvMap {
    let mut resp = make_base_resp(cmd);
    arm_apply_result(&mut resp, &arm.emergency_stop());
    resp
}

/// Registers the built-in handler catalog, aliases included. Called once
/// from the composition root; later registrations may override entries.
pub fn register_default_handlers(router: &mut CommandRouter) {
    router.register("moveL", &["pose", "jointpos"], h_move_l);
    router.register("moveLine", &["pose", "jointpos"], h_move_l);
    router.register("moveJoint", &["jointpos"], h_move_joint);
    router.register("moveJ", &["jointpos"], h_move_joint);
    router.register("power_on", &[], h_power_on);
    router.register("power_on_enable", &[], h_power_on);
    router.register("initialize_arm", &[], h_power_on);
    router.register("fault_reset", &[], h_fault_reset);
    router.register("reset_system", &[], h_fault_reset);
    router.register("slowSpeed", &["enable"], h_slow_speed);
    router.register("slow_speed", &["enable"], h_slow_speed);
    router.register("quickStop", &["enable"], h_quick_stop);
    router.register("quick_stop", &["enable"], h_quick_stop);
    router.register("path_download", &["file"], h_path_download);
    router.register("demo_echo", &["msg"], h_demo_echo);
    router.register("robot_mode", &[], h_robot_mode);
    router.register("get_joint_actual_pos", &[], h_get_joint_actual_pos);

    router.register("is_arm_ready", &[], h_is_arm_ready);
    router.register("is_power_on", &[], h_is_power_on);
    router.register("is_start_signal", &[], h_is_start_signal);
    router.register("is_stop_signal", &[], h_is_stop_signal);
    router.register("is_trajectory_complete", &[], h_is_trajectory_complete);
    router.register(
        "is_all_trajectories_complete",
        &[],
        h_is_all_trajectories_complete,
    );
    router.register("wait_for_start", &[], h_wait_for_start);
    router.register("execute_trajectory", &[], h_execute_trajectory);
    router.register("emergency_stop", &[], h_emergency_stop);
}

/// Router with the default catalog registered.
#[must_use]
pub fn default_router() -> CommandRouter {
    let mut router = CommandRouter::new();
    register_default_handlers(&mut router);
    router
}
