// SPDX-License-Identifier: Apache-2.0

//! Deterministic in-memory controller simulator.
//!
//! Used for development without hardware and as the base of the test
//! doubles. Behavior follows the controller's observable state machine, not
//! its timing: transitions are immediate.

use crate::modes::{RobotMode, SDK_FAILED, SDK_OK, SdkCode};
use crate::sdk::{ArmConnParams, MotionRequest, PathAction, PathData, RobotSdk};

/// Pure-Rust stand-in for the vendor controller.
#[derive(Debug)]
pub struct SimRobotSdk {
    connected: bool,
    mode: RobotMode,
    digital_in: [bool; 8],
    digital_out: [bool; 8],
    path_running: bool,
    downloaded_paths: usize,
    jointpos_deg: [f64; 6],
}

impl SimRobotSdk {
    /// Creates a simulator in the unpowered state.
    #[must_use]
    pub fn new() -> Self {
        SimRobotSdk {
            connected: false,
            mode: RobotMode::JointPowerOff,
            digital_in: [false; 8],
            digital_out: [false; 8],
            path_running: false,
            downloaded_paths: 0,
            jointpos_deg: [0.0; 6],
        }
    }

    /// Forces a digital input, for tests and scripted demos.
    pub fn set_digital_in(&mut self, index: usize, value: bool) {
        if index < self.digital_in.len() {
            self.digital_in[index] = value;
        }
    }

    /// Last values driven on the digital outputs.
    #[must_use]
    pub fn digital_out_state(&self) -> &[bool; 8] {
        &self.digital_out
    }

    fn ready_for_motion(&self) -> bool {
        self.connected
            && matches!(
                self.mode,
                RobotMode::ProgramStop | RobotMode::Jog | RobotMode::Running
            )
    }
}

impl Default for SimRobotSdk {
    fn default() -> Self {
        SimRobotSdk::new()
    }
}

impl RobotSdk for SimRobotSdk {
    fn connect(&mut self, _conn: &ArmConnParams) -> SdkCode {
        self.connected = true;
        SDK_OK
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn move_line(&mut self, req: &MotionRequest) -> SdkCode {
        if !self.ready_for_motion() {
            return SDK_FAILED;
        }
        self.jointpos_deg = req.jointpos_deg;
        SDK_OK
    }

    fn move_joint(&mut self, req: &MotionRequest) -> SdkCode {
        if !self.ready_for_motion() {
            return SDK_FAILED;
        }
        self.jointpos_deg = req.jointpos_deg;
        SDK_OK
    }

    fn robot_mode(&mut self) -> Result<i32, SdkCode> {
        if !self.connected {
            return Err(SDK_FAILED);
        }
        Ok(self.mode.as_i32())
    }

    fn power_on(&mut self) -> SdkCode {
        if !self.connected {
            return SDK_FAILED;
        }
        if self.mode == RobotMode::JointPowerOff {
            self.mode = RobotMode::JointIdle;
        }
        SDK_OK
    }

    fn enable(&mut self) -> SdkCode {
        if !self.connected {
            return SDK_FAILED;
        }
        if self.mode == RobotMode::JointIdle {
            self.mode = RobotMode::ProgramStop;
        }
        SDK_OK
    }

    fn stop(&mut self) -> SdkCode {
        if !self.connected {
            return SDK_FAILED;
        }
        self.path_running = false;
        if self.mode == RobotMode::Running {
            self.mode = RobotMode::ProgramStop;
        }
        SDK_OK
    }

    fn fault_reset(&mut self) -> SdkCode {
        if self.connected { SDK_OK } else { SDK_FAILED }
    }

    fn set_digital_out(&mut self, index: i32, value: bool) -> SdkCode {
        if !self.connected {
            return SDK_FAILED;
        }
        match usize::try_from(index) {
            Ok(i) if i < self.digital_out.len() => {
                self.digital_out[i] = value;
                SDK_OK
            }
            _ => SDK_FAILED,
        }
    }

    fn digital_in(&mut self, index: i32) -> Result<bool, SdkCode> {
        if !self.connected {
            return Err(SDK_FAILED);
        }
        match usize::try_from(index) {
            Ok(i) if i < self.digital_in.len() => Ok(self.digital_in[i]),
            _ => Err(SDK_FAILED),
        }
    }

    fn path_load_file(&mut self, file: &str, max_points: usize) -> Result<PathData, SdkCode> {
        if file.is_empty() || max_points == 0 {
            return Err(SDK_FAILED);
        }
        // A short synthetic path; the simulator does not read the vendor
        // trajectory format.
        let n = max_points.min(8);
        Ok(PathData {
            points: vec![[0.0; 6]; n],
        })
    }

    fn path_download(&mut self, data: &PathData, _index: i32, _move_type: i32) -> SdkCode {
        if !self.connected || data.points.is_empty() {
            return SDK_FAILED;
        }
        self.downloaded_paths += 1;
        SDK_OK
    }

    fn path_action(&mut self, _index: i32, action: PathAction) -> SdkCode {
        if !self.connected {
            return SDK_FAILED;
        }
        match action {
            PathAction::Start => {
                self.path_running = false; // completes immediately
                self.mode = RobotMode::ProgramStop;
            }
            PathAction::Stop => self.path_running = false,
        }
        SDK_OK
    }

    fn path_run_status(&mut self) -> Result<i32, SdkCode> {
        if !self.connected {
            return Err(SDK_FAILED);
        }
        Ok(i32::from(self.path_running))
    }

    fn joint_actual_pos_deg(&mut self) -> Result<[f64; 6], SdkCode> {
        if !self.connected {
            return Err(SDK_FAILED);
        }
        Ok(self.jointpos_deg)
    }
}
