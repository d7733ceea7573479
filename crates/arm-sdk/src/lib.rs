// SPDX-License-Identifier: Apache-2.0

//! Robot SDK session layer.
//!
//! The vendor controller SDK is a C library with a connection handle that is
//! not thread-safe and expects degrees on every angular field. This crate
//! confines it: [`ArmSdkSession`] owns the handle behind a session mutex,
//! converts between the system's units (radians, millimeters) and the SDK's
//! (degrees), applies the motion safety gates, and manages the connection
//! lifecycle including lazy reconnects after transport-style failures.
//!
//! Everything above this crate talks to the [`ArmClient`] capability trait
//! and is unit-clean: radians in, radians out.

mod error;
mod modes;
mod sdk;
mod session;
mod sim;

#[cfg(feature = "test-utils")]
pub mod testkit;

pub use error::{ArmCallError, ArmResult};
pub use modes::{RobotMode, SdkCode, is_transport_failure};
pub use sdk::{ArmConnParams, MotionRequest, PathAction, PathData, RobotSdk, load_sdk};
pub use session::{ArmClient, ArmSdkSession, JointMove, JointReading, LinearMove, SessionOptions};
pub use sim::SimRobotSdk;
