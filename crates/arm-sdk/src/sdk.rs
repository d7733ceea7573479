// SPDX-License-Identifier: Apache-2.0

//! Low-level vendor SDK boundary.
//!
//! [`RobotSdk`] is the capability table this repository depends on; the
//! vendor's direct-linked C binding implements it in deployment builds and
//! stays out of this tree. Development and test builds use the pure-Rust
//! simulator behind `WXZ_ARM_SIM`.

use crate::modes::SdkCode;
use crate::sim::SimRobotSdk;
use tracing::info;

/// Controller connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmConnParams {
    /// Controller IP.
    pub ip: String,
    /// Controller port.
    pub port: i32,
    /// Controller password.
    pub passwd: String,
}

/// One motion request on the wire to the SDK, already in vendor units
/// (degrees for every angular field).
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Target pose; XYZ in millimeters, RPY in degrees. Zeroed for joint
    /// moves.
    pub pose: [f64; 6],
    /// Target joint positions in degrees.
    pub jointpos_deg: [f64; 6],
    /// Per-axis speed.
    pub speed: f64,
    /// Per-axis acceleration.
    pub acc: f64,
    /// Per-axis jerk. Vendor-reserved: always zero on the wire.
    pub jerk: f64,
}

/// Path buffer produced by the vendor file loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    /// Loaded way-points, XYZ+RPY per point in vendor units.
    pub points: Vec<[f64; 6]>,
}

/// Start/stop action on a downloaded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    /// Begin executing the path.
    Start,
    /// Abort the running path.
    Stop,
}

/// Vendor SDK capability table.
///
/// Exactly one caller may be inside any method at a time; the session layer
/// guarantees that with its lock. Implementations hold the connection handle
/// internally: `connect` creates it, `disconnect` destroys it, and every
/// other call requires a live handle.
pub trait RobotSdk: Send {
    /// Creates the controller session.
    fn connect(&mut self, conn: &ArmConnParams) -> SdkCode;
    /// Destroys the controller session. Idempotent.
    fn disconnect(&mut self);
    /// Linear move in Cartesian space.
    fn move_line(&mut self, req: &MotionRequest) -> SdkCode;
    /// Joint-space move.
    fn move_joint(&mut self, req: &MotionRequest) -> SdkCode;
    /// Current controller mode (vendor integer).
    fn robot_mode(&mut self) -> Result<i32, SdkCode>;
    /// Powers the joints.
    fn power_on(&mut self) -> SdkCode;
    /// Enables the servos.
    fn enable(&mut self) -> SdkCode;
    /// Immediate motion stop.
    fn stop(&mut self) -> SdkCode;
    /// Clears latched controller faults.
    fn fault_reset(&mut self) -> SdkCode;
    /// Drives a configurable digital output.
    fn set_digital_out(&mut self, index: i32, value: bool) -> SdkCode;
    /// Reads a configurable digital input.
    fn digital_in(&mut self, index: i32) -> Result<bool, SdkCode>;
    /// Loads a trajectory file into a path buffer of at most `max_points`.
    fn path_load_file(&mut self, file: &str, max_points: usize) -> Result<PathData, SdkCode>;
    /// Downloads a loaded path into controller slot `index`.
    fn path_download(&mut self, data: &PathData, index: i32, move_type: i32) -> SdkCode;
    /// Starts or stops the path in slot `index`.
    fn path_action(&mut self, index: i32, action: PathAction) -> SdkCode;
    /// Raw path run status; 1 while running, anything else when stopped.
    fn path_run_status(&mut self) -> Result<i32, SdkCode>;
    /// Actual joint positions in degrees.
    fn joint_actual_pos_deg(&mut self) -> Result<[f64; 6], SdkCode>;
}

/// Binds an SDK implementation for this process.
///
/// Deployment builds link the vendor binding; this tree only carries the
/// simulator, enabled by `WXZ_ARM_SIM=1`. Without either, startup must fail
/// (exit code 2 in the composition root).
#[must_use]
pub fn load_sdk() -> Option<Box<dyn RobotSdk>> {
    let sim = std::env::var("WXZ_ARM_SIM").is_ok_and(|v| v == "1" || v == "true");
    if sim {
        info!("arm SDK: simulator bound (WXZ_ARM_SIM)");
        return Some(Box::new(SimRobotSdk::new()));
    }
    None
}
