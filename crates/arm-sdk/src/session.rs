// SPDX-License-Identifier: Apache-2.0

//! The SDK session: capability trait and its vendor-backed implementation.

use crate::error::{ArmCallError, ArmResult};
use crate::modes::{RobotMode, SDK_OK, SdkCode, is_transport_failure};
use crate::sdk::{ArmConnParams, MotionRequest, PathAction, RobotSdk};
use parking_lot::Mutex;
use std::f64::consts::PI;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEG_PER_RAD: f64 = 180.0 / PI;

// Motion safety gates. Requests outside these bounds never reach the SDK.
const MAX_LINEAR_SPEED_MM_S: f64 = 3000.0;
const MAX_JOINT_SPEED_RAD_S: f64 = 6.0;
const MAX_ACC: f64 = 20_000.0;
const MAX_JERK: f64 = 20_000.0;
// Catches degree-valued inputs handed to a radian API.
const MAX_PLAUSIBLE_ANGLE_RAD: f64 = 10.0;

// Controller-fixed digital output mapping.
const SLOW_SPEED_DO_INDEX: i32 = 0;
const QUICK_STOP_DO_INDEX: i32 = 1;

// Hard ceiling on the path buffer regardless of what the caller asks for.
const MAX_PATH_POINTS: usize = 100_000;

/// A linear (Cartesian) move request in system units.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearMove {
    /// Seed joint positions in radians.
    pub jointpos_rad: [f64; 6],
    /// Target pose; XYZ in millimeters, RPY in radians.
    pub pose: [f64; 6],
    /// Tool speed in mm/s.
    pub speed_mm_s: f64,
    /// Acceleration.
    pub acc: f64,
    /// Jerk. Accepted for validation; zeroed on the wire.
    pub jerk: f64,
    /// Skips the large-angle plausibility gate.
    pub unit_override: bool,
}

/// A joint-space move request in system units.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMove {
    /// Target joint positions in radians.
    pub jointpos_rad: [f64; 6],
    /// Joint speed in rad/s.
    pub speed_rad_s: f64,
    /// Skips the large-angle plausibility gate.
    pub unit_override: bool,
}

/// Actual joint positions in both unit systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReading {
    /// Radians; the system-facing value.
    pub rad: [f64; 6],
    /// Degrees; attached to responses for debugging.
    pub deg: [f64; 6],
}

/// Session tuning read from the environment at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Digital input carrying the start signal.
    pub start_di_index: i32,
    /// Digital input carrying the stop signal.
    pub stop_di_index: i32,
    /// Controller path slot used by trajectory execution.
    pub path_index: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            start_di_index: 0,
            stop_di_index: 1,
            path_index: 0,
        }
    }
}

/// Capability interface of the arm. Everything above the session layer,
/// including the command handlers and the RPC plane, depends on this trait
/// only.
pub trait ArmClient: Send + Sync {
    /// Linear move with safety gates and unit conversion.
    fn move_linear(&self, req: &LinearMove) -> ArmResult;
    /// Joint move with safety gates and unit conversion.
    fn move_joint(&self, req: &JointMove) -> ArmResult;
    /// Multi-step power-up: no-op unless the controller reports
    /// joints-powered-off.
    fn power_on_enable(&self) -> ArmResult;
    /// Current controller mode as a vendor integer.
    fn robot_mode(&self) -> ArmResult<i32>;
    /// Clears latched controller faults.
    fn fault_reset(&self) -> ArmResult;
    /// Drives the slow-speed output.
    fn slow_speed(&self, enable: bool) -> ArmResult;
    /// Drives the quick-stop output (active-low on the controller).
    fn quick_stop(&self, enable: bool) -> ArmResult;
    /// Loads a trajectory file and downloads it into a controller slot.
    fn path_download(&self, file: &str, index: i32, move_type: i32, max_points: usize)
    -> ArmResult;
    /// Actual joint positions, radians and degrees.
    fn joint_actual_pos(&self) -> ArmResult<JointReading>;
    /// True when the controller is in a motion-capable mode.
    fn is_arm_ready(&self) -> bool;
    /// True when the joints are powered.
    fn is_power_on(&self) -> bool;
    /// True while the start input is asserted.
    fn is_start_signal(&self) -> bool;
    /// True while the stop input is asserted.
    fn is_stop_signal(&self) -> bool;
    /// True when no path is executing.
    fn is_trajectory_complete(&self) -> bool;
    /// True when every queued path finished. The controller runs one path at
    /// a time, so this mirrors [`ArmClient::is_trajectory_complete`].
    fn is_all_trajectories_complete(&self) -> bool;
    /// Polls for the start signal until `timeout`; `Ok(false)` on timeout or
    /// an asserted stop signal.
    fn wait_for_start(&self, timeout: Duration) -> ArmResult<bool>;
    /// Starts the configured path and polls to completion; issues a stop on
    /// timeout or an asserted stop signal, then returns `Ok(false)`.
    fn execute_trajectory(&self, timeout: Duration) -> ArmResult<bool>;
    /// Immediate motion stop.
    fn emergency_stop(&self) -> ArmResult;
}

struct SessionState {
    sdk: Box<dyn RobotSdk>,
    connected: bool,
}

/// Vendor-backed [`ArmClient`].
///
/// All SDK access funnels through the session mutex, so exactly one SDK call
/// is in flight process-wide even if a caller bypasses the SDK strand. The
/// connection is lazy: every operation ensures it on entry, and
/// transport-style failures drop it so the next call reconnects.
pub struct ArmSdkSession {
    state: Mutex<SessionState>,
    conn: ArmConnParams,
    options: SessionOptions,
}

impl ArmSdkSession {
    /// Wraps a bound SDK.
    #[must_use]
    pub fn new(sdk: Box<dyn RobotSdk>, conn: ArmConnParams, options: SessionOptions) -> Self {
        ArmSdkSession {
            state: Mutex::new(SessionState {
                sdk,
                connected: false,
            }),
            conn,
            options,
        }
    }

    fn connect_locked(&self, state: &mut SessionState) -> SdkCode {
        if state.connected {
            return SDK_OK;
        }
        let code = state.sdk.connect(&self.conn);
        if code == SDK_OK {
            state.connected = true;
            info!(ip = %self.conn.ip, port = self.conn.port, "arm connected");
        }
        code
    }

    fn disconnect_locked(state: &mut SessionState) {
        if state.connected {
            state.sdk.disconnect();
            state.connected = false;
        }
    }

    // Connect, retrying once through a clean disconnect on the first
    // failure.
    fn ensure_connected_locked(&self, state: &mut SessionState) -> ArmResult {
        let code = self.connect_locked(state);
        if code == SDK_OK {
            return Ok(());
        }
        Self::disconnect_locked(state);
        let code = self.connect_locked(state);
        if code == SDK_OK {
            Ok(())
        } else {
            warn!(code, "arm connect failed");
            Err(ArmCallError::Sdk { code })
        }
    }

    // Classifies a non-zero vendor result: transport-style failures drop
    // the connection so the next call starts from a clean handle.
    fn fail(state: &mut SessionState, code: SdkCode) -> ArmCallError {
        if is_transport_failure(code) {
            warn!(code, "transport-style sdk failure, disconnecting");
            Self::disconnect_locked(state);
        }
        ArmCallError::Sdk { code }
    }

    fn finish(state: &mut SessionState, code: SdkCode) -> ArmResult {
        if code == SDK_OK {
            Ok(())
        } else {
            Err(Self::fail(state, code))
        }
    }

    fn with_sdk<T>(
        &self,
        f: impl FnOnce(&mut SessionState) -> ArmResult<T>,
    ) -> ArmResult<T> {
        let mut state = self.state.lock();
        self.ensure_connected_locked(&mut state)?;
        f(&mut state)
    }

    fn read_digital_in(&self, index: i32) -> Option<bool> {
        self.with_sdk(|state| match state.sdk.digital_in(index) {
            Ok(v) => Ok(v),
            Err(code) => Err(Self::fail(state, code)),
        })
        .ok()
    }

    fn mode_locked(state: &mut SessionState) -> ArmResult<i32> {
        match state.sdk.robot_mode() {
            Ok(mode) => Ok(mode),
            Err(code) => Err(Self::fail(state, code)),
        }
    }

    /// Stops the session, dropping any live connection.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        Self::disconnect_locked(&mut state);
    }
}

fn all_finite(v: &[f64; 6]) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn plausible_radians(v: &[f64]) -> bool {
    v.iter().all(|x| x.abs() <= MAX_PLAUSIBLE_ANGLE_RAD)
}

fn rad6_to_deg(v: &[f64; 6]) -> [f64; 6] {
    let mut out = [0.0; 6];
    for (o, x) in out.iter_mut().zip(v.iter()) {
        *o = x * DEG_PER_RAD;
    }
    out
}

fn validate_linear(req: &LinearMove) -> ArmResult {
    if !all_finite(&req.pose) {
        return Err(ArmCallError::InvalidArgs { field: "pose" });
    }
    if !all_finite(&req.jointpos_rad) {
        return Err(ArmCallError::InvalidArgs { field: "jointpos" });
    }
    if !(req.speed_mm_s > 0.0 && req.speed_mm_s <= MAX_LINEAR_SPEED_MM_S) {
        return Err(ArmCallError::InvalidArgs { field: "speed" });
    }
    if !(0.0..=MAX_ACC).contains(&req.acc) {
        return Err(ArmCallError::InvalidArgs { field: "acc" });
    }
    if !(0.0..=MAX_JERK).contains(&req.jerk) {
        return Err(ArmCallError::InvalidArgs { field: "jerk" });
    }
    if !req.unit_override {
        if !plausible_radians(&req.pose[3..6]) {
            return Err(ArmCallError::InvalidArgs { field: "pose" });
        }
        if !plausible_radians(&req.jointpos_rad) {
            return Err(ArmCallError::InvalidArgs { field: "jointpos" });
        }
    }
    Ok(())
}

fn validate_joint(req: &JointMove) -> ArmResult {
    if !all_finite(&req.jointpos_rad) {
        return Err(ArmCallError::InvalidArgs { field: "jointpos" });
    }
    if !(req.speed_rad_s > 0.0 && req.speed_rad_s <= MAX_JOINT_SPEED_RAD_S) {
        return Err(ArmCallError::InvalidArgs { field: "speed" });
    }
    if !req.unit_override && !plausible_radians(&req.jointpos_rad) {
        return Err(ArmCallError::InvalidArgs { field: "jointpos" });
    }
    Ok(())
}

impl ArmClient for ArmSdkSession {
    fn move_linear(&self, req: &LinearMove) -> ArmResult {
        validate_linear(req)?;
        let mut pose = req.pose;
        for angle in &mut pose[3..6] {
            *angle *= DEG_PER_RAD;
        }
        let wire = MotionRequest {
            pose,
            jointpos_deg: rad6_to_deg(&req.jointpos_rad),
            speed: req.speed_mm_s,
            acc: req.acc,
            // Vendor-reserved; the controller rejects non-zero values.
            jerk: 0.0,
        };
        self.with_sdk(|state| {
            let code = state.sdk.move_line(&wire);
            Self::finish(state, code)
        })
    }

    fn move_joint(&self, req: &JointMove) -> ArmResult {
        validate_joint(req)?;
        let speed_deg = req.speed_rad_s * DEG_PER_RAD;
        let wire = MotionRequest {
            pose: [0.0; 6],
            jointpos_deg: rad6_to_deg(&req.jointpos_rad),
            speed: speed_deg,
            acc: speed_deg * 3.0,
            jerk: 0.0,
        };
        self.with_sdk(|state| {
            let code = state.sdk.move_joint(&wire);
            Self::finish(state, code)
        })
    }

    fn power_on_enable(&self) -> ArmResult {
        self.with_sdk(|state| {
            let mode = Self::mode_locked(state)?;
            debug!(mode, "power_on_enable observed mode");
            if mode != RobotMode::JointPowerOff.as_i32() {
                return Ok(());
            }

            let code = state.sdk.power_on();
            if code != SDK_OK {
                return Err(ArmCallError::Sdk { code });
            }
            for _ in 0..40 {
                std::thread::sleep(Duration::from_millis(50));
                if Self::mode_locked(state)? == RobotMode::JointIdle.as_i32() {
                    break;
                }
            }

            let code = state.sdk.enable();
            if code != SDK_OK {
                return Err(ArmCallError::Sdk { code });
            }
            for _ in 0..40 {
                std::thread::sleep(Duration::from_millis(200));
                if Self::mode_locked(state)? == RobotMode::ProgramStop.as_i32() {
                    break;
                }
            }
            Ok(())
        })
    }

    fn robot_mode(&self) -> ArmResult<i32> {
        self.with_sdk(|state| Self::mode_locked(state))
    }

    fn fault_reset(&self) -> ArmResult {
        self.with_sdk(|state| {
            let code = state.sdk.fault_reset();
            Self::finish(state, code)
        })
    }

    fn slow_speed(&self, enable: bool) -> ArmResult {
        self.with_sdk(|state| {
            let code = state.sdk.set_digital_out(SLOW_SPEED_DO_INDEX, enable);
            Self::finish(state, code)
        })
    }

    fn quick_stop(&self, enable: bool) -> ArmResult {
        self.with_sdk(|state| {
            // Active-low on the controller side.
            let code = state.sdk.set_digital_out(QUICK_STOP_DO_INDEX, !enable);
            Self::finish(state, code)
        })
    }

    fn path_download(
        &self,
        file: &str,
        index: i32,
        move_type: i32,
        max_points: usize,
    ) -> ArmResult {
        let max_points = max_points.min(MAX_PATH_POINTS);
        self.with_sdk(|state| {
            // The path buffer lives in this frame and drops on every exit
            // path.
            let data = match state.sdk.path_load_file(file, max_points) {
                Ok(data) => data,
                Err(code) => return Err(Self::fail(state, code)),
            };
            let code = state.sdk.path_download(&data, index, move_type);
            Self::finish(state, code)
        })
    }

    fn joint_actual_pos(&self) -> ArmResult<JointReading> {
        self.with_sdk(|state| match state.sdk.joint_actual_pos_deg() {
            Ok(deg) => {
                let mut rad = [0.0; 6];
                for (r, d) in rad.iter_mut().zip(deg.iter()) {
                    *r = d / DEG_PER_RAD;
                }
                Ok(JointReading { rad, deg })
            }
            Err(code) => Err(Self::fail(state, code)),
        })
    }

    fn is_arm_ready(&self) -> bool {
        self.robot_mode().is_ok_and(|mode| {
            mode == RobotMode::ProgramStop.as_i32()
                || mode == RobotMode::Jog.as_i32()
                || mode == RobotMode::JointIdle.as_i32()
        })
    }

    fn is_power_on(&self) -> bool {
        self.robot_mode().is_ok_and(|mode| {
            mode != RobotMode::JointPowerOff.as_i32() && mode != RobotMode::Closed.as_i32()
        })
    }

    fn is_start_signal(&self) -> bool {
        self.read_digital_in(self.options.start_di_index)
            .unwrap_or(false)
    }

    fn is_stop_signal(&self) -> bool {
        self.read_digital_in(self.options.stop_di_index)
            .unwrap_or(false)
    }

    fn is_trajectory_complete(&self) -> bool {
        self.with_sdk(|state| match state.sdk.path_run_status() {
            // 1 while running; 0 or the stopped sentinel otherwise.
            Ok(status) => Ok(status != 1),
            Err(code) => Err(Self::fail(state, code)),
        })
        .unwrap_or(false)
    }

    fn is_all_trajectories_complete(&self) -> bool {
        self.is_trajectory_complete()
    }

    fn wait_for_start(&self, timeout: Duration) -> ArmResult<bool> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_stop_signal() {
                return Ok(false);
            }
            if self.is_start_signal() {
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        Ok(false)
    }

    fn execute_trajectory(&self, timeout: Duration) -> ArmResult<bool> {
        let path_index = self.options.path_index;
        info!(path_index, "execute_trajectory start");
        self.with_sdk(|state| {
            let code = state.sdk.path_action(path_index, PathAction::Start);
            Self::finish(state, code)
        })?;

        let stop_path = || {
            let _ = self.with_sdk(|state| {
                let code = state.sdk.path_action(path_index, PathAction::Stop);
                Self::finish(state, code)
            });
        };

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_stop_signal() {
                stop_path();
                return Ok(false);
            }
            if self.is_trajectory_complete() {
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        stop_path();
        Ok(false)
    }

    fn emergency_stop(&self) -> ArmResult {
        self.with_sdk(|state| {
            let code = state.sdk.stop();
            Self::finish(state, code)
        })
    }
}
