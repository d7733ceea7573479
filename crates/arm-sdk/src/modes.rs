// SPDX-License-Identifier: Apache-2.0

//! Vendor result codes and the robot mode state machine.

/// Raw vendor result code. Zero is success.
pub type SdkCode = i32;

/// Success code returned by every vendor call.
pub const SDK_OK: SdkCode = 0;
/// Generic failure used by the bindings when no better code exists.
pub const SDK_FAILED: SdkCode = -1;
/// The controller did not answer within the vendor's internal deadline.
pub const SDK_OPERATE_TIMEOUT: SdkCode = 2;
/// The controller rejected the call because another one is still running.
pub const SDK_THREAD_RUNNING: SdkCode = 3;

/// True for result codes that indicate a broken transport rather than a
/// rejected operation. The session disconnects on these so the next call
/// reconnects with a fresh handle.
#[must_use]
pub fn is_transport_failure(code: SdkCode) -> bool {
    code == SDK_OPERATE_TIMEOUT || code == SDK_THREAD_RUNNING
}

/// Controller mode as reported by the vendor SDK.
///
/// Power-up walks `Closed -> JointPowerOff -> JointIdle -> ProgramStop`, after
/// which the controller moves between `ProgramStop`, `Jog` and `Running` on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotMode {
    /// No controller session.
    Closed,
    /// Connected, joints unpowered.
    JointPowerOff,
    /// Joints powered, servos not enabled.
    JointIdle,
    /// Enabled and idle; ready for motion commands.
    ProgramStop,
    /// Manual jog.
    Jog,
    /// Executing a program or path.
    Running,
}

impl RobotMode {
    /// Integer value on the wire (`mode=<int>` in responses).
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            RobotMode::Closed => 0,
            RobotMode::JointPowerOff => 1,
            RobotMode::JointIdle => 2,
            RobotMode::ProgramStop => 3,
            RobotMode::Jog => 4,
            RobotMode::Running => 5,
        }
    }

    /// Parses the vendor integer; unknown values yield `None`.
    #[must_use]
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(RobotMode::Closed),
            1 => Some(RobotMode::JointPowerOff),
            2 => Some(RobotMode::JointIdle),
            3 => Some(RobotMode::ProgramStop),
            4 => Some(RobotMode::Jog),
            5 => Some(RobotMode::Running),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in [
            RobotMode::Closed,
            RobotMode::JointPowerOff,
            RobotMode::JointIdle,
            RobotMode::ProgramStop,
            RobotMode::Jog,
            RobotMode::Running,
        ] {
            assert_eq!(RobotMode::from_i32(mode.as_i32()), Some(mode));
        }
        assert_eq!(RobotMode::from_i32(42), None);
    }

    #[test]
    fn test_transport_failures() {
        assert!(is_transport_failure(SDK_OPERATE_TIMEOUT));
        assert!(is_transport_failure(SDK_THREAD_RUNNING));
        assert!(!is_transport_failure(SDK_OK));
        assert!(!is_transport_failure(SDK_FAILED));
    }
}
