// SPDX-License-Identifier: Apache-2.0

//! Scriptable [`ArmClient`] double for tests in dependent crates.
//!
//! Enabled by the `test-utils` feature; not part of the production surface.

use crate::error::ArmResult;
use crate::session::{ArmClient, JointMove, JointReading, LinearMove};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Mutable script and call log of a [`MockArmClient`].
#[derive(Debug, Clone)]
pub struct MockArmState {
    /// Result returned by motion and simple ops.
    pub call_result: ArmResult,
    /// Mode returned by `robot_mode`.
    pub mode: i32,
    /// Reading returned by `joint_actual_pos`.
    pub reading: ArmResult<JointReading>,
    /// Value returned by the `is_*` queries.
    pub flags: bool,
    /// Result of `wait_for_start` / `execute_trajectory`.
    pub trajectory_result: ArmResult<bool>,
    /// Names of the capability methods invoked, in order.
    pub calls: Vec<&'static str>,
}

impl Default for MockArmState {
    fn default() -> Self {
        MockArmState {
            call_result: Ok(()),
            mode: 3,
            reading: Ok(JointReading {
                rad: [0.0; 6],
                deg: [0.0; 6],
            }),
            flags: true,
            trajectory_result: Ok(true),
            calls: Vec::new(),
        }
    }
}

/// Scriptable arm client sharing its state handle with the test.
#[derive(Clone, Default)]
pub struct MockArmClient {
    /// Shared script/log handle.
    pub state: Arc<Mutex<MockArmState>>,
}

impl MockArmClient {
    /// Creates a mock with default (all-success) behavior.
    #[must_use]
    pub fn new() -> Self {
        MockArmClient::default()
    }

    fn record(&self, call: &'static str) {
        self.state.lock().calls.push(call);
    }
}

impl ArmClient for MockArmClient {
    fn move_linear(&self, _req: &LinearMove) -> ArmResult {
        self.record("move_linear");
        self.state.lock().call_result
    }

    fn move_joint(&self, _req: &JointMove) -> ArmResult {
        self.record("move_joint");
        self.state.lock().call_result
    }

    fn power_on_enable(&self) -> ArmResult {
        self.record("power_on_enable");
        self.state.lock().call_result
    }

    fn robot_mode(&self) -> ArmResult<i32> {
        self.record("robot_mode");
        let state = self.state.lock();
        state.call_result.map(|()| state.mode)
    }

    fn fault_reset(&self) -> ArmResult {
        self.record("fault_reset");
        self.state.lock().call_result
    }

    fn slow_speed(&self, _enable: bool) -> ArmResult {
        self.record("slow_speed");
        self.state.lock().call_result
    }

    fn quick_stop(&self, _enable: bool) -> ArmResult {
        self.record("quick_stop");
        self.state.lock().call_result
    }

    fn path_download(&self, _f: &str, _i: i32, _m: i32, _n: usize) -> ArmResult {
        self.record("path_download");
        self.state.lock().call_result
    }

    fn joint_actual_pos(&self) -> ArmResult<JointReading> {
        self.record("joint_actual_pos");
        self.state.lock().reading
    }

    fn is_arm_ready(&self) -> bool {
        self.record("is_arm_ready");
        self.state.lock().flags
    }

    fn is_power_on(&self) -> bool {
        self.record("is_power_on");
        self.state.lock().flags
    }

    fn is_start_signal(&self) -> bool {
        self.record("is_start_signal");
        self.state.lock().flags
    }

    fn is_stop_signal(&self) -> bool {
        self.record("is_stop_signal");
        self.state.lock().flags
    }

    fn is_trajectory_complete(&self) -> bool {
        self.record("is_trajectory_complete");
        self.state.lock().flags
    }

    fn is_all_trajectories_complete(&self) -> bool {
        self.record("is_all_trajectories_complete");
        self.state.lock().flags
    }

    fn wait_for_start(&self, _timeout: Duration) -> ArmResult<bool> {
        self.record("wait_for_start");
        self.state.lock().trajectory_result
    }

    fn execute_trajectory(&self, _timeout: Duration) -> ArmResult<bool> {
        self.record("execute_trajectory");
        self.state.lock().trajectory_result
    }

    fn emergency_stop(&self) -> ArmResult {
        self.record("emergency_stop");
        self.state.lock().call_result
    }
}
